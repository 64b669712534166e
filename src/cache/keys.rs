//! Deterministic cache key builders
//!
//! Every key is `namespace:id:view`. Callers must go through these helpers so
//! two requests for the same logical resource land on the same key and the
//! invalidation templates in `invalidation::rules` keep matching.

pub const PATH: &str = "path";
pub const PATHS_LIST: &str = "paths:list";
pub const MODULE: &str = "module";
pub const CHALLENGE: &str = "challenge";
pub const ENROLLMENT: &str = "enrollment";
pub const PROGRESS: &str = "progress";
pub const SUBMISSION: &str = "submission";
pub const USER: &str = "user";

/// Every namespace this service writes under
pub const NAMESPACES: [&str; 8] = [
    PATH, PATHS_LIST, MODULE, CHALLENGE, ENROLLMENT, PROGRESS, SUBMISSION, USER,
];

/// True if `key` lives in one of our namespaces. Anything else sharing the
/// store belongs to someone else and must be left alone.
pub fn is_owned(key: &str) -> bool {
    NAMESPACES.iter().any(|ns| {
        key.strip_prefix(ns)
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

pub fn entity(namespace: &str, id: &str, view: &str) -> String {
    format!("{}:{}:{}", namespace, id, view)
}

pub fn path_detail(path_id: &str) -> String {
    entity(PATH, path_id, "detail")
}

pub fn path_modules(path_id: &str) -> String {
    entity(PATH, path_id, "modules")
}

pub fn path_stats(path_id: &str) -> String {
    entity(PATH, path_id, "stats")
}

/// Listing of learning paths, e.g. `paths:list:published`
pub fn paths_list(variant: &str) -> String {
    format!("{}:{}", PATHS_LIST, variant)
}

pub fn module_detail(module_id: &str) -> String {
    entity(MODULE, module_id, "detail")
}

pub fn module_challenges(module_id: &str) -> String {
    entity(MODULE, module_id, "challenges")
}

pub fn challenge_detail(challenge_id: &str) -> String {
    entity(CHALLENGE, challenge_id, "detail")
}

pub fn challenge_stats(challenge_id: &str) -> String {
    entity(CHALLENGE, challenge_id, "stats")
}

pub fn user_enrollments(user_id: &str) -> String {
    entity(USER, user_id, "enrollments")
}

pub fn user_dashboard(user_id: &str) -> String {
    entity(USER, user_id, "dashboard")
}

pub fn user_profile(user_id: &str) -> String {
    entity(USER, user_id, "profile")
}

/// Progress overall, or scoped to one path when `path_id` is given
pub fn user_progress(user_id: &str, path_id: Option<&str>) -> String {
    match path_id {
        Some(path_id) => format!("{}:{}:progress:{}", USER, user_id, path_id),
        None => entity(USER, user_id, "progress"),
    }
}

pub fn user_submissions(user_id: &str, challenge_id: Option<&str>) -> String {
    match challenge_id {
        Some(challenge_id) => format!("{}:{}:submissions:{}", USER, user_id, challenge_id),
        None => entity(USER, user_id, "submissions"),
    }
}

/// Glob matching every view of one entity, e.g. `path:123:*`
pub fn entity_pattern(namespace: &str, id: &str) -> String {
    format!("{}:{}:*", namespace, id)
}

pub fn paths_list_pattern() -> String {
    format!("{}:*", PATHS_LIST)
}

/// Glob matching every key of one user
pub fn user_namespace(user_id: &str) -> String {
    entity_pattern(USER, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_deterministic() {
        assert_eq!(path_detail("123"), "path:123:detail");
        assert_eq!(path_detail("123"), path_detail("123"));
        assert_eq!(user_enrollments("45"), "user:45:enrollments");
        assert_eq!(paths_list("published"), "paths:list:published");
    }

    #[test]
    fn test_scoped_user_keys() {
        assert_eq!(user_progress("7", None), "user:7:progress");
        assert_eq!(user_progress("7", Some("p1")), "user:7:progress:p1");
        assert_eq!(user_submissions("7", Some("c9")), "user:7:submissions:c9");
        assert_eq!(user_namespace("7"), "user:7:*");
        assert_eq!(entity_pattern(MODULE, "3"), "module:3:*");
        assert_eq!(paths_list_pattern(), "paths:list:*");
    }

    #[test]
    fn test_ownership() {
        assert!(is_owned("path:1:detail"));
        assert!(is_owned("paths:list:published"));
        assert!(is_owned("user:42:dashboard"));
        assert!(!is_owned("sess:abc"));
        assert!(!is_owned("paths:other"));
        assert!(!is_owned("username:1"));
        assert!(!is_owned("user"));
    }
}
