//! Entity-name string constants shared across feature slices and OpenAPI tags.

pub const SYSTEM_TAG: &str = "system";
pub const SYNC_TAG: &str = "sync";

pub const WORKSPACE: &str = "workspace";
pub const USER: &str = "user";
pub const STUDENT: &str = "student";
pub const QUIZ: &str = "quiz";
pub const SURVEY: &str = "survey";
