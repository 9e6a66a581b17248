use crate::users::User;

pub const WELCOME_MESSAGE: &str = "Welcome to SMS Calendar Assistant! 🎉
Reply with:
1 - Start free trial
2 - Learn more
3 - Talk to support";

/// Canned reply for users who have not finished onboarding, `None` otherwise.
///
/// Nothing ever marks a user as onboarded, so a new number keeps receiving
/// the welcome menu until `onboarding_complete` is set out-of-band.
pub fn decide(user: &User) -> Option<&'static str> {
    if user.onboarding_complete {
        None
    } else {
        Some(WELCOME_MESSAGE)
    }
}
