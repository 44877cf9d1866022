//! Static TLS record buffers
//!
//! A TLS 1.3 record carries up to 16 KB of plaintext plus a 5 byte header
//! and a 16 byte AEAD tag, so the read side gets 18 KB. We choose our own
//! outgoing record size and 16 KB is plenty. Both live in main SRAM; they
//! are far too large for a task stack.
//!
//! Only the MQTT task opens TLS connections and it holds at most one at a
//! time, which is what makes handing out `&'static mut` sound.

#![allow(unsafe_code)]

const TLS_READ_BUF_SIZE: usize = 18 * 1024;
const TLS_WRITE_BUF_SIZE: usize = 16 * 1024;

static mut TLS_READ_BUF: [u8; TLS_READ_BUF_SIZE] = [0; TLS_READ_BUF_SIZE];
static mut TLS_WRITE_BUF: [u8; TLS_WRITE_BUF_SIZE] = [0; TLS_WRITE_BUF_SIZE];

/// `(read, write)` buffers for one TLS connection
///
/// # Safety
///
/// The caller must drop every reference from a previous call before calling
/// this again, and must not call it from more than one task.
pub unsafe fn tls_buffers() -> (&'static mut [u8], &'static mut [u8]) {
    // SAFETY: exclusivity is the caller's contract, see above
    unsafe {
        (
            &mut *core::ptr::addr_of_mut!(TLS_READ_BUF),
            &mut *core::ptr::addr_of_mut!(TLS_WRITE_BUF),
        )
    }
}
