/// Narrow read-only view of the authentication state.
///
/// The registry consults this when enforcing the plan ceiling. `None`
/// means the auth state is unknown; callers treat that as unauthenticated
/// (fail closed).
pub trait AuthStatePort: Send + Sync {
    fn is_authenticated(&self) -> Option<bool>;
}
