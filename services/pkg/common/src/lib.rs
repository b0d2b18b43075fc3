use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trait for generating unique token identifiers.
pub trait UuidGenerator: Send + Sync + 'static {
    /// Generates a new UUID.
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Default UUID v4 generator implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Generator;

impl UuidGenerator for UuidV4Generator {}

/// Trait for providing the current UTC time.
pub trait Now: Send + Sync + 'static {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time as unix seconds.
    fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Implementation that returns the actual current system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNow;

impl Now for SystemNow {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(feature = "mock")]
pub mod mock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;

    /// 2020-01-01 00:00:00 UTC
    pub const DEFAULT_TIME: i64 = 1_577_836_800;

    /// Mock UUID generator for testing.
    #[derive(Debug, Clone, Default)]
    pub struct MockUuidGenerator {
        /// The UUID to return from generate().
        pub uuid: Uuid,
    }

    impl MockUuidGenerator {
        /// Creates a new mock generator with the nil UUID.
        pub fn new() -> Self {
            Self { uuid: Uuid::nil() }
        }

        /// Creates a new mock generator with the specified UUID.
        pub fn with_uuid(uuid: Uuid) -> Self {
            Self { uuid }
        }
    }

    impl UuidGenerator for MockUuidGenerator {
        fn generate(&self) -> Uuid {
            self.uuid
        }
    }

    /// Mock time provider for testing.
    ///
    /// Clones share the same instant, so an issuer and a verifier built from
    /// the same mock observe every [`MockNow::advance`].
    #[derive(Debug, Clone)]
    pub struct MockNow {
        seconds: Arc<AtomicI64>,
    }

    impl MockNow {
        /// Creates a new mock frozen at the given unix seconds.
        pub fn at(seconds: i64) -> Self {
            Self {
                seconds: Arc::new(AtomicI64::new(seconds)),
            }
        }

        /// Moves the clock forward (or backward for negative values).
        pub fn advance(&self, seconds: i64) {
            self.seconds.fetch_add(seconds, Ordering::SeqCst);
        }
    }

    impl Default for MockNow {
        fn default() -> Self {
            Self::at(DEFAULT_TIME)
        }
    }

    impl Now for MockNow {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.seconds.load(Ordering::SeqCst), 0).unwrap_or_default()
        }
    }
}
