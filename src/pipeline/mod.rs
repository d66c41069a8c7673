pub mod clock;
pub mod library;
pub mod notation;
pub mod persistence;
pub mod session;
pub mod transport;
pub mod tune;

#[cfg(test)]
pub mod test_fixture;
