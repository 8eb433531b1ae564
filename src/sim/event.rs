/// Events emitted while applying input or advancing a tick.
/// The presentation layer consumes these for sound and the HUD.

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Started,
    Paused,
    Flapped,
    PlayerHit,
    LevelReloaded { level: i32 },
    BorderCrossed { from: i32, to: i32 },
    InvincibilityToggled(bool),
    Won,
}
