//! Pixel and sample format enumerations, mirroring well-known codec-library
//! values so the converter/decoder boundary never has to translate.

use crate::property::Property;

/// Pixel layout of a decoded video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    None,
    YUV420P,
    YUV422P,
    YUV444P,
    NV12,
    NV21,
    RGBA,
    BGRA,
    ARGB,
    RGBA64,
    P010,
    /// Opaque driver-owned surface (GPU decode output); converters must
    /// copy it back to a mappable format before touching the bytes.
    HardwareSurface,
}

impl PixelFormat {
    pub fn is_hardware(self) -> bool {
        matches!(self, PixelFormat::HardwareSurface)
    }

    /// Bytes per pixel for planar/packed formats this crate actually reads;
    /// hardware surfaces and `None` have no fixed stride.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            PixelFormat::RGBA | PixelFormat::BGRA | PixelFormat::ARGB => Some(4),
            PixelFormat::RGBA64 => Some(8),
            _ => None,
        }
    }

    /// Stable string tag used in `PixelFormatList`/`PixelFormat` pad
    /// properties, so negotiation never depends on enum discriminant order.
    pub fn tag(self) -> &'static str {
        match self {
            PixelFormat::None => "none",
            PixelFormat::YUV420P => "yuv420p",
            PixelFormat::YUV422P => "yuv422p",
            PixelFormat::YUV444P => "yuv444p",
            PixelFormat::NV12 => "nv12",
            PixelFormat::NV21 => "nv21",
            PixelFormat::RGBA => "rgba",
            PixelFormat::BGRA => "bgra",
            PixelFormat::ARGB => "argb",
            PixelFormat::RGBA64 => "rgba64",
            PixelFormat::P010 => "p010",
            PixelFormat::HardwareSurface => "hw",
        }
    }

    pub fn from_tag(tag: &str) -> Option<PixelFormat> {
        Some(match tag {
            "none" => PixelFormat::None,
            "yuv420p" => PixelFormat::YUV420P,
            "yuv422p" => PixelFormat::YUV422P,
            "yuv444p" => PixelFormat::YUV444P,
            "nv12" => PixelFormat::NV12,
            "nv21" => PixelFormat::NV21,
            "rgba" => PixelFormat::RGBA,
            "bgra" => PixelFormat::BGRA,
            "argb" => PixelFormat::ARGB,
            "rgba64" => PixelFormat::RGBA64,
            "p010" => PixelFormat::P010,
            "hw" => PixelFormat::HardwareSurface,
            _ => return None,
        })
    }
}

impl From<PixelFormat> for Property {
    fn from(f: PixelFormat) -> Self {
        Property::String(f.tag().to_owned())
    }
}

/// Sample layout of a decoded audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    None,
    U8,
    S16,
    S32,
    Flt,
    Dbl,
    U8P,
    S16P,
    S32P,
    FltP,
    DblP,
}

impl SampleFormat {
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            SampleFormat::U8P
                | SampleFormat::S16P
                | SampleFormat::S32P
                | SampleFormat::FltP
                | SampleFormat::DblP
        )
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::None => 0,
            SampleFormat::U8 | SampleFormat::U8P => 1,
            SampleFormat::S16 | SampleFormat::S16P => 2,
            SampleFormat::S32 | SampleFormat::S32P => 4,
            SampleFormat::Flt | SampleFormat::FltP => 4,
            SampleFormat::Dbl | SampleFormat::DblP => 8,
        }
    }

    pub fn bytes_per_frame(self, channels: u32) -> usize {
        self.bytes_per_sample() * channels as usize
    }

    /// The packed counterpart of a planar format (identity if already packed).
    pub fn packed(self) -> SampleFormat {
        match self {
            SampleFormat::U8P => SampleFormat::U8,
            SampleFormat::S16P => SampleFormat::S16,
            SampleFormat::S32P => SampleFormat::S32,
            SampleFormat::FltP => SampleFormat::Flt,
            SampleFormat::DblP => SampleFormat::Dbl,
            other => other,
        }
    }

    /// The planar counterpart of a packed format (identity if already planar).
    pub fn planar(self) -> SampleFormat {
        match self {
            SampleFormat::U8 => SampleFormat::U8P,
            SampleFormat::S16 => SampleFormat::S16P,
            SampleFormat::S32 => SampleFormat::S32P,
            SampleFormat::Flt => SampleFormat::FltP,
            SampleFormat::Dbl => SampleFormat::DblP,
            other => other,
        }
    }

    /// Stable string tag used in `SampleFormatList`/`SampleFormat` pad
    /// properties.
    pub fn tag(self) -> &'static str {
        match self {
            SampleFormat::None => "none",
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::Flt => "flt",
            SampleFormat::Dbl => "dbl",
            SampleFormat::U8P => "u8p",
            SampleFormat::S16P => "s16p",
            SampleFormat::S32P => "s32p",
            SampleFormat::FltP => "fltp",
            SampleFormat::DblP => "dblp",
        }
    }

    pub fn from_tag(tag: &str) -> Option<SampleFormat> {
        Some(match tag {
            "none" => SampleFormat::None,
            "u8" => SampleFormat::U8,
            "s16" => SampleFormat::S16,
            "s32" => SampleFormat::S32,
            "flt" => SampleFormat::Flt,
            "dbl" => SampleFormat::Dbl,
            "u8p" => SampleFormat::U8P,
            "s16p" => SampleFormat::S16P,
            "s32p" => SampleFormat::S32P,
            "fltp" => SampleFormat::FltP,
            "dblp" => SampleFormat::DblP,
            _ => return None,
        })
    }
}

impl From<SampleFormat> for Property {
    fn from(f: SampleFormat) -> Self {
        Property::String(f.tag().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_round_trip() {
        assert_eq!(SampleFormat::S16.planar(), SampleFormat::S16P);
        assert_eq!(SampleFormat::S16P.packed(), SampleFormat::S16);
        assert!(SampleFormat::S16P.is_planar());
        assert!(!SampleFormat::S16.is_planar());
    }

    #[test]
    fn bytes_per_frame_multiplies_channels() {
        assert_eq!(SampleFormat::S32.bytes_per_frame(2), 8);
    }

    #[test]
    fn pixel_format_tag_round_trips() {
        assert_eq!(PixelFormat::from_tag(PixelFormat::YUV420P.tag()), Some(PixelFormat::YUV420P));
        assert_eq!(PixelFormat::from_tag("bogus"), None);
    }

    #[test]
    fn sample_format_tag_round_trips() {
        assert_eq!(SampleFormat::from_tag(SampleFormat::FltP.tag()), Some(SampleFormat::FltP));
        assert_eq!(SampleFormat::from_tag("bogus"), None);
    }
}
