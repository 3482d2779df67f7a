mod cli;
mod lifecycle;
mod persistence;
