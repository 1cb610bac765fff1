//! Clock type ranking used by `MediaController` to pick a master clock.

/// Kind of clock a `MediaClock` implementation represents. Ranked by integer
/// value — the master clock is whichever registered clock has the highest
/// rank, so audio (typically the least tolerant of glitches) wins over video,
/// which wins over the wall-clock fallback, which wins over subtitles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClockType {
    Unknown = 0,
    Subtitle = 1,
    Video = 2,
    External = 3,
    Audio = 4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_outranks_everything() {
        assert!(ClockType::Audio > ClockType::Video);
        assert!(ClockType::Video > ClockType::External);
        assert!(ClockType::External > ClockType::Subtitle);
    }
}
