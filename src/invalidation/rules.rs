//! Event type → key templates
//!
//! Each entity type owns a fixed, ordered list of templates. A template
//! renders to a concrete key or a glob, or to `None` when the event lacks an
//! input it needs (no `userId`, no `pathId` in metadata, ...).

use super::events::{EntityType, InvalidationEvent};
use crate::cache::keys;

pub struct TemplateContext<'a> {
    pub event: &'a InvalidationEvent,
}

impl<'a> TemplateContext<'a> {
    pub fn new(event: &'a InvalidationEvent) -> Self {
        Self { event }
    }

    pub fn id(&self) -> &str {
        self.event.entity_id.trim()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.event
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn meta(&self, key: &str) -> Option<String> {
        self.event.metadata_str(key)
    }
}

pub struct KeyTemplate {
    pub name: &'static str,
    render: fn(&TemplateContext<'_>) -> Option<String>,
}

impl KeyTemplate {
    const fn new(name: &'static str, render: fn(&TemplateContext<'_>) -> Option<String>) -> Self {
        Self { name, render }
    }

    pub fn render(&self, ctx: &TemplateContext<'_>) -> Option<String> {
        (self.render)(ctx)
    }
}

const LEARNING_PATH: &[KeyTemplate] = &[
    KeyTemplate::new("path-views", |c| Some(keys::entity_pattern(keys::PATH, c.id()))),
    KeyTemplate::new("path-lists", |_| Some(keys::paths_list_pattern())),
];

const MODULE: &[KeyTemplate] = &[
    KeyTemplate::new("module-views", |c| Some(keys::entity_pattern(keys::MODULE, c.id()))),
    KeyTemplate::new("parent-path-views", |c| {
        c.meta("pathId").map(|p| keys::entity_pattern(keys::PATH, &p))
    }),
];

const CHALLENGE: &[KeyTemplate] = &[
    KeyTemplate::new("challenge-views", |c| {
        Some(keys::entity_pattern(keys::CHALLENGE, c.id()))
    }),
    KeyTemplate::new("parent-module-views", |c| {
        c.meta("moduleId").map(|m| keys::entity_pattern(keys::MODULE, &m))
    }),
];

const ENROLLMENT: &[KeyTemplate] = &[
    KeyTemplate::new("enrollment-views", |c| {
        Some(keys::entity_pattern(keys::ENROLLMENT, c.id()))
    }),
    KeyTemplate::new("user-enrollments", |c| c.user_id().map(keys::user_enrollments)),
    KeyTemplate::new("user-dashboard", |c| c.user_id().map(keys::user_dashboard)),
    KeyTemplate::new("path-stats", |c| c.meta("pathId").map(|p| keys::path_stats(&p))),
];

const PROGRESS: &[KeyTemplate] = &[
    KeyTemplate::new("progress-views", |c| {
        Some(keys::entity_pattern(keys::PROGRESS, c.id()))
    }),
    KeyTemplate::new("user-progress", |c| {
        c.user_id()
            .map(|u| format!("{}*", keys::user_progress(u, None)))
    }),
    KeyTemplate::new("user-dashboard", |c| c.user_id().map(keys::user_dashboard)),
];

const SUBMISSION: &[KeyTemplate] = &[
    KeyTemplate::new("submission-views", |c| {
        Some(keys::entity_pattern(keys::SUBMISSION, c.id()))
    }),
    KeyTemplate::new("challenge-stats", |c| {
        c.meta("challengeId").map(|ch| keys::challenge_stats(&ch))
    }),
    KeyTemplate::new("user-submissions", |c| {
        c.user_id()
            .map(|u| format!("{}*", keys::user_submissions(u, None)))
    }),
];

const USER: &[KeyTemplate] = &[KeyTemplate::new("user-namespace", |c| {
    Some(keys::user_namespace(c.id()))
})];

pub fn templates_for(entity_type: EntityType) -> &'static [KeyTemplate] {
    match entity_type {
        EntityType::LearningPath => LEARNING_PATH,
        EntityType::Module => MODULE,
        EntityType::Challenge => CHALLENGE,
        EntityType::Enrollment => ENROLLMENT,
        EntityType::Progress => PROGRESS,
        EntityType::Submission => SUBMISSION,
        EntityType::User => USER,
    }
}

/// Render all applicable targets for an event, in template order.
/// Duplicate renders are dropped.
pub fn resolve_targets(event: &InvalidationEvent) -> Vec<(&'static str, String)> {
    let ctx = TemplateContext::new(event);
    let mut targets: Vec<(&'static str, String)> = Vec::new();
    for template in templates_for(event.entity_type) {
        match template.render(&ctx) {
            Some(target) if !targets.iter().any(|(_, t)| *t == target) => {
                targets.push((template.name, target))
            }
            Some(_) => {}
            None => tracing::debug!(
                template = template.name,
                entity_type = %event.entity_type,
                "Template skipped: event lacks required input"
            ),
        }
    }
    targets
}
