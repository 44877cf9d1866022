//! Network client trait

use super::error::NetworkError;

/// One-shot network protocol client
///
/// Implementors log and return their errors rather than panicking; the
/// caller decides when to run them again.
pub trait NetworkClient {
    /// Output type for successful client operation
    type Output;

    /// Run the client operation once (e.g. one SNTP exchange)
    fn run(
        &mut self,
        stack: &embassy_net::Stack<'static>,
    ) -> impl core::future::Future<Output = Result<Self::Output, NetworkError>>;
}
