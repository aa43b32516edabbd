/// Source of commands for a locally simulated entity. `None` on an entity
/// means remote/unowned; `Some` means the host simulates it.
///
/// Commands are yielded by value so implementations are free to live behind
/// shared handles (input queues, bots, replays); the entity only reads.
pub trait Controller {
    type Command: Clone;

    /// The most recent command, used by the server simulation step.
    fn latest_command(&self) -> Option<Self::Command>;

    /// Commands not yet confirmed by the server, oldest first, replayed by
    /// client-side prediction.
    fn pending_commands(&self) -> Box<dyn Iterator<Item = Self::Command> + '_>;
}
