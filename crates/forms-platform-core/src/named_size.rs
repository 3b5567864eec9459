//! Named font-size resolution.
//!
//! Each host maps the framework's symbolic sizes to concrete values. Desktop
//! hosts use a fixed table; Tizen devices pick point sizes per idiom and scale
//! them into device-independent units.

use std::fmt;

/// Host family a [`crate::PlatformServices`] instance reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuntimePlatform {
    Gtk,
    Tizen,
}

impl RuntimePlatform {
    pub fn name(self) -> &'static str {
        match self {
            RuntimePlatform::Gtk => "GTK",
            RuntimePlatform::Tizen => "Tizen",
        }
    }
}

impl fmt::Display for RuntimePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Device form factor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetIdiom {
    #[default]
    Unsupported,
    Phone,
    Tablet,
    Desktop,
    Tv,
    Watch,
}

/// Symbolic font sizes understood by text controls.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NamedSize {
    Default,
    Micro,
    Small,
    Medium,
    Large,
    Body,
    Header,
    Title,
    Subtitle,
    Caption,
}

impl NamedSize {
    pub const ALL: [NamedSize; 10] = [
        NamedSize::Default,
        NamedSize::Micro,
        NamedSize::Small,
        NamedSize::Medium,
        NamedSize::Large,
        NamedSize::Body,
        NamedSize::Header,
        NamedSize::Title,
        NamedSize::Subtitle,
        NamedSize::Caption,
    ];
}

/// Resolve `size` for the given host and idiom.
///
/// `font_scale` converts Tizen point sizes into device-independent units and
/// is ignored on GTK, whose table is already expressed in final units.
pub fn named_size(
    platform: RuntimePlatform,
    idiom: TargetIdiom,
    size: NamedSize,
    font_scale: f64,
) -> f64 {
    match platform {
        RuntimePlatform::Gtk => gtk_named_size(size),
        RuntimePlatform::Tizen => f64::from(tizen_point_size(idiom, size)) * font_scale,
    }
}

fn gtk_named_size(size: NamedSize) -> f64 {
    match size {
        NamedSize::Default => 11.0,
        NamedSize::Micro | NamedSize::Caption => 12.0,
        NamedSize::Small | NamedSize::Body => 14.0,
        NamedSize::Medium => 17.0,
        NamedSize::Subtitle => 20.0,
        NamedSize::Large => 22.0,
        NamedSize::Title => 24.0,
        NamedSize::Header => 46.0,
    }
}

/// Columns are (tv, watch, everything else).
fn tizen_point_size(idiom: TargetIdiom, size: NamedSize) -> u32 {
    let (tv, watch, other) = match size {
        NamedSize::Micro => (24, 24, 19),
        NamedSize::Small => (26, 30, 22),
        NamedSize::Default | NamedSize::Medium => (28, 32, 25),
        NamedSize::Large => (32, 36, 31),
        NamedSize::Body => (30, 32, 28),
        NamedSize::Caption => (26, 24, 22),
        NamedSize::Header => (84, 36, 138),
        NamedSize::Subtitle => (30, 30, 28),
        NamedSize::Title => (42, 36, 40),
    };
    match idiom {
        TargetIdiom::Tv => tv,
        TargetIdiom::Watch => watch,
        _ => other,
    }
}
