//! Miscellaneous convenience methods

use serenity::all::{ChannelId, RoleId};

pub trait MessageHelper {
    /// First role mentioned, e.g. `<@&1234567890>`
    fn mentioned_role(&self) -> Option<RoleId>;
    /// First channel mentioned, e.g. `<#1234567890>`
    fn mentioned_channel(&self) -> Option<ChannelId>;
}

impl MessageHelper for serenity::all::Message {
    fn mentioned_role(&self) -> Option<RoleId> {
        // Discord only resolves mentions of roles that exist; fall back to the raw markup.
        self.mention_roles
            .first()
            .copied()
            .or_else(|| first_mention(&self.content, "<@&").map(RoleId::new))
    }

    fn mentioned_channel(&self) -> Option<ChannelId> {
        first_mention(&self.content, "<#").map(ChannelId::new)
    }
}

/// Id of the first `{open}<digits>>` in `content`.  Zero is not a valid id.
fn first_mention(content: &str, open: &str) -> Option<u64> {
    content.match_indices(open).find_map(|(start, _)| {
        let rest = &content[start + open.len()..];
        let end = rest.find('>')?;
        rest[..end].parse::<u64>().ok().filter(|id| *id != 0)
    })
}

/// A 1-based list position as typed by a user.
pub fn parse_position(content: &str) -> Option<usize> {
    content.trim().trim_end_matches('.').parse().ok()
}

/// The login a user typed for a streamer.  Accepts `name`, `@name` and channel URLs.
pub fn parse_streamer_login(content: &str) -> Option<String> {
    let token = content.split_whitespace().next()?;
    let token = token.trim_end_matches('/');
    let login = token.rsplit('/').next().unwrap_or(token);
    let login = login.trim_start_matches('@');

    let valid = !login.is_empty()
        && login
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| login.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_mention() {
        assert_eq!(first_mention("ping <@&123> please", "<@&"), Some(123));
        assert_eq!(first_mention("<#5> and <#6>", "<#"), Some(5));
        assert_eq!(first_mention("<#abc> <#7>", "<#"), Some(7));
        assert_eq!(first_mention("<@123>", "<@&"), None);
        assert_eq!(first_mention("<#0>", "<#"), None);
        assert_eq!(first_mention("<#12", "<#"), None);
        assert_eq!(first_mention("no mentions here", "<#"), None);
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position(" 2 "), Some(2));
        assert_eq!(parse_position("3."), Some(3));
        assert_eq!(parse_position("0"), Some(0));
        assert_eq!(parse_position("-1"), None);
        assert_eq!(parse_position("two"), None);
    }

    #[test]
    fn test_parse_streamer_login() {
        assert_eq!(parse_streamer_login("Alice"), Some("alice".to_owned()));
        assert_eq!(parse_streamer_login("  @bob_99 "), Some("bob_99".to_owned()));
        assert_eq!(
            parse_streamer_login("https://www.twitch.tv/Carol/"),
            Some("carol".to_owned())
        );
        assert_eq!(parse_streamer_login("dave and friends"), Some("dave".to_owned()));
        assert_eq!(parse_streamer_login(""), None);
        assert_eq!(parse_streamer_login("not-a-login"), None);
    }
}
