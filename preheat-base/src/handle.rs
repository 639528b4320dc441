/// Cancellation token allocated by an asset catalog adapter when it starts loading an image. The
/// slot that issued the request owns it until the load completes or is cancelled.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Ord, PartialOrd)]
pub struct LoadHandle(pub u64);

/// Identity of a reusable display slot (a grid cell). The same slot is rebound to different assets
/// as the user scrolls.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Ord, PartialOrd)]
pub struct SlotId(pub u64);
