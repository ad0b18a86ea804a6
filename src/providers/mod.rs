pub mod launchpad;
pub mod privy;
pub mod twitter;

#[cfg(test)]
mod tests;
