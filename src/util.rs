use instant::Duration;
use instant::Instant;

////////////////////////////////////////////////////////////////////////////////
// Timer

#[derive(Debug)]
enum TimerInner {
    Finite { end: Instant },
    Infinite,
}

/// A wall-clock budget checked cooperatively (once per candidate, not
/// preemptively inside an oracle call).
#[derive(Debug)]
pub struct Timer(TimerInner);

impl Timer {
    pub fn finite(duration: Duration) -> Self {
        Timer(TimerInner::Finite {
            end: Instant::now() + duration,
        })
    }

    pub fn infinite() -> Self {
        Timer(TimerInner::Infinite)
    }

    pub fn expired(&self) -> bool {
        match self.0 {
            TimerInner::Finite { end } => Instant::now() > end,
            TimerInner::Infinite => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Utilities

/// Seconds since the Unix epoch; used for Fix Bank entry timestamps.
pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
