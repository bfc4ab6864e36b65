// Runners Module
// Leaf factories that turn task, get and put plans into runnable steps

pub mod shell;

pub use shell::{ShellConfig, ShellLeafFactory, ShellStep};
