pub mod builtin;
pub mod gameplay;
pub mod judgment;
pub mod lanes;
pub mod parsing;
pub mod scheduler;
pub mod scroll;
pub mod session;
pub mod song;
pub mod stage_stats;
pub mod tile;
pub mod timing_windows;
