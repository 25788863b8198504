/// What a component did with a key.
///
/// Views try their active components in order and stop at the first one
/// that does not return `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, and the parent should act on this event
  Event(T),
  /// Not consumed, try the next handler
  NotHandled,
}
