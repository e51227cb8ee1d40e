//! # MetaKV Async Client
//!
//! Purpose: Provide an async client for key/value cache servers speaking the
//! text meta protocol (`ms`/`mg`), with a small connection pool to amortize
//! connection setup.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections; each call gets one exclusively.
//! 2. **Scoped Release**: Pool entries return on drop, on every exit path.
//! 3. **Protocol Framing**: Responses are delimited by CRLF and `VA <size>`,
//!    never by read sizes.
//! 4. **Lazy Connect**: Sockets open on first use and are reused afterwards.
//!
//! ## Example
//!
//! ```no_run
//! use mkv_client::{Pool, PoolConfig};
//!
//! # async fn demo() -> mkv_client::ClientResult<()> {
//! let pool = Pool::new(PoolConfig::default())?;
//! pool.set("users:", "42", "alice").await?;
//! let value = pool.get("users:", "42").await?;
//! assert_eq!(value.as_deref(), Some(&b"alice"[..]));
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod pool;

pub use config::{
    ClientConfig, GrowthPolicy, PoolConfig, Transport, DEFAULT_HOST, DEFAULT_POOL_SIZE,
    DEFAULT_PORT, DEFAULT_READ_BUFFER_SIZE,
};
pub use connection::{Connection, LIST_TABLE};
pub use error::{ClientError, ClientResult};
pub use pool::{Pool, PooledConnection};

pub use mkv_common::{GetFlag, GetOptions, MetaResponse, ProtocolError, ReturnCode, StoreStatus};
