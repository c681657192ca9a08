pub mod helpers;
mod trigger;
