mod command;
mod ytdl;

pub use ytdl::{MediaResolver, Ytdl};
