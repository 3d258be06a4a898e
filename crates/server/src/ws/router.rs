use regex::Regex;
use uuid::Uuid;

/// Parameters extracted from a matched channel path. One variant per
/// registered channel, dispatched exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelParams {
    TaskStatus { task_id: Uuid },
}

/// Matches a request path against the registered channel patterns, in
/// order. First match wins.
pub fn match_route(path: &str) -> Option<ChannelParams> {
    if let Ok(re) = Regex::new(r"^/(?:api/)?task/([^/]+)/status/?$") {
        if let Some(captures) = re.captures(path) {
            let task_id = Uuid::parse_str(&captures[1]).ok()?;
            return Some(ChannelParams::TaskStatus { task_id });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_task_status_path() {
        let id = Uuid::new_v4();
        let matched = match_route(&format!("/task/{id}/status"));
        assert_eq!(matched, Some(ChannelParams::TaskStatus { task_id: id }));
    }

    #[test]
    fn matches_api_prefixed_path() {
        let id = Uuid::new_v4();
        let matched = match_route(&format!("/api/task/{id}/status/"));
        assert_eq!(matched, Some(ChannelParams::TaskStatus { task_id: id }));
    }

    #[test]
    fn rejects_unknown_paths() {
        assert_eq!(match_route("/task/abc/logs"), None);
        assert_eq!(match_route("/status"), None);
        assert_eq!(match_route(""), None);
    }

    #[test]
    fn rejects_non_uuid_task_ids() {
        assert_eq!(match_route("/task/not-a-uuid/status"), None);
    }
}
