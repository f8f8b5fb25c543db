pub mod config;
pub mod demo;
pub mod io;
pub mod net;
pub mod paths;

#[cfg(test)]
mod test;
