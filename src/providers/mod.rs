pub mod finanzguru;

pub use finanzguru::FinanzguruClient;
