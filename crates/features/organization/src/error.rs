use std::borrow::Cow;

/// Organizations error type.
#[anchor_derive::anchor_error]
pub enum OrganizationError {
    #[error("Internal error{}: {message}", format_context(context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
