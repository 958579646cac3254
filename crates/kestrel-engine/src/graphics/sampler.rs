/// Texture minification/magnification filter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum SamplerFilter {
    /// Use whatever the renderer was configured with.
    #[default]
    Default,
    Point,
    Linear,
    Bilinear,
    Trilinear,
}

/// Texture coordinate wrapping behaviour along one axis.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum SamplerAddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampling parameters of a texture.
///
/// `SamplerFilter::Default` and `max_anisotropy == 0` defer to the renderer's
/// [`SamplerDefaults`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SamplerState {
    pub filter: SamplerFilter,
    pub address_x: SamplerAddressMode,
    pub address_y: SamplerAddressMode,
    pub max_anisotropy: u32,
}

impl SamplerState {
    /// Replaces the deferred fields with `defaults`.
    pub fn resolve(self, defaults: SamplerDefaults) -> Self {
        Self {
            filter: if self.filter == SamplerFilter::Default { defaults.filter } else { self.filter },
            max_anisotropy: if self.max_anisotropy == 0 { defaults.max_anisotropy.max(1) } else { self.max_anisotropy },
            ..self
        }
    }
}

/// Renderer-wide sampling values for textures that do not set their own.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SamplerDefaults {
    pub filter: SamplerFilter,
    pub max_anisotropy: u32,
}

impl Default for SamplerDefaults {
    fn default() -> Self {
        Self { filter: SamplerFilter::Linear, max_anisotropy: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_fields_take_defaults() {
        let defaults = SamplerDefaults { filter: SamplerFilter::Trilinear, max_anisotropy: 8 };
        let resolved = SamplerState { address_x: SamplerAddressMode::Repeat, ..SamplerState::default() }.resolve(defaults);

        assert_eq!(resolved.filter, SamplerFilter::Trilinear);
        assert_eq!(resolved.max_anisotropy, 8);
        assert_eq!(resolved.address_x, SamplerAddressMode::Repeat);
    }

    #[test]
    fn explicit_fields_are_kept() {
        let state = SamplerState { filter: SamplerFilter::Point, max_anisotropy: 2, ..SamplerState::default() };
        assert_eq!(state.resolve(SamplerDefaults::default()), state);
    }

    #[test]
    fn zero_default_anisotropy_resolves_to_one() {
        let defaults = SamplerDefaults { max_anisotropy: 0, ..SamplerDefaults::default() };
        assert_eq!(SamplerState::default().resolve(defaults).max_anisotropy, 1);
    }
}
