//! One-request-lifetime messages carried across a redirect in a cookie.

use log::*;
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "_flash";

const COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; SameSite=Lax";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Messages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alert: Option<String>,
}

impl Messages {
    fn is_empty(&self) -> bool {
        self.notice.is_none() && self.alert.is_none()
    }
}

/// Flash messages for one request.
///
/// Readers see what the previous response stored; messages set now are only
/// written out for the next request.
#[derive(Debug, Clone, Default)]
pub struct Flash {
    incoming: Messages,
    had_cookie: bool,
    outgoing: Messages,
}

impl Flash {
    /// Hydrate from a `Cookie` request header. Undecodable values read as empty.
    pub fn from_cookie_header(header: Option<&str>) -> Self {
        let Some(raw) = header.and_then(find_flash_cookie) else {
            return Self::default();
        };

        let incoming = urlencoding::decode(raw)
            .ok()
            .and_then(|json| serde_json::from_str::<Messages>(&json).ok())
            .unwrap_or_else(|| {
                debug!("Discarding undecodable flash cookie");
                Messages::default()
            });

        Self {
            incoming,
            had_cookie: true,
            outgoing: Messages::default(),
        }
    }

    pub fn notice(&self) -> Option<&str> {
        self.incoming.notice.as_deref()
    }

    pub fn alert(&self) -> Option<&str> {
        self.incoming.alert.as_deref()
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.outgoing.notice = Some(message.into());
    }

    pub fn set_alert(&mut self, message: impl Into<String>) {
        self.outgoing.alert = Some(message.into());
    }

    /// Whether a cookie came in or messages were set during this request.
    pub fn is_pending(&self) -> bool {
        self.had_cookie || !self.outgoing.is_empty()
    }

    /// The `Set-Cookie` value that stores new messages, or clears a consumed cookie.
    pub fn response_cookie(&self) -> Option<String> {
        if !self.outgoing.is_empty() {
            let json = match serde_json::to_string(&self.outgoing) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize flash messages: {e}");
                    return self.clearing_cookie();
                }
            };
            return Some(format!(
                "{FLASH_COOKIE}={}; {COOKIE_ATTRIBUTES}",
                urlencoding::encode(&json)
            ));
        }

        if self.had_cookie {
            return Some(clear_cookie());
        }
        None
    }

    /// A cookie that discards everything, when anything is pending.
    pub fn clearing_cookie(&self) -> Option<String> {
        self.is_pending().then(clear_cookie)
    }
}

fn clear_cookie() -> String {
    format!("{FLASH_COOKIE}=; Max-Age=0; {COOKIE_ATTRIBUTES}")
}

fn find_flash_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == FLASH_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_value(set_cookie: &str) -> &str {
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, v)| v)
            .unwrap()
    }

    #[test]
    fn test_no_cookie_no_messages() {
        let flash = Flash::from_cookie_header(Some("session=abc"));
        assert_eq!(flash.notice(), None);
        assert!(!flash.is_pending());
        assert_eq!(flash.response_cookie(), None);
        assert_eq!(flash.clearing_cookie(), None);
    }

    #[test]
    fn test_set_message_round_trips_through_cookie() {
        let mut flash = Flash::default();
        flash.set_notice("Created; all good");
        assert_eq!(flash.notice(), None, "set messages are for the next request");

        let set_cookie = flash.response_cookie().unwrap();
        assert!(set_cookie.starts_with("_flash="));
        assert!(set_cookie.contains("Path=/"));

        let header = format!("other=1; _flash={}", cookie_value(&set_cookie));
        let next = Flash::from_cookie_header(Some(&header));
        assert_eq!(next.notice(), Some("Created; all good"));
        assert_eq!(next.alert(), None);
    }

    #[test]
    fn test_consumed_cookie_is_cleared() {
        let flash = Flash::from_cookie_header(Some("_flash=%7B%22alert%22%3A%22Nope%22%7D"));
        assert_eq!(flash.alert(), Some("Nope"));
        assert_eq!(
            flash.response_cookie().unwrap(),
            "_flash=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_garbage_cookie_reads_empty_and_is_cleared() {
        let flash = Flash::from_cookie_header(Some("_flash=%%%garbage"));
        assert_eq!(flash.notice(), None);
        assert!(flash.response_cookie().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_clearing_cookie_when_message_set() {
        let mut flash = Flash::default();
        flash.set_alert("later");
        assert!(flash.clearing_cookie().unwrap().contains("Max-Age=0"));
    }
}
