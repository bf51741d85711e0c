// Inputs: analog sensor side of the board.
// Raw samples are taken on a fixed period by the sampler task and held in a
// lock-protected cache that the link dispatcher reads on demand.

pub mod sensor;
pub mod cache;
pub mod sampler;
