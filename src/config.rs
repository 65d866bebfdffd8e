//! Configuration objects.

use crate::{
    codec, driver::Driver, raw::VAConfigID, Device, Entrypoint, Entrypoints, Error, Profile,
    Profiles, Result, VAError,
};

/// A codec configuration for a specific [`Entrypoint`] and [`Profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub profile: Profile,
    pub entrypoint: Entrypoint,
}

impl<D: Device> Driver<D> {
    /// Returns the list of [`Profile`]s the driver can decode.
    pub fn query_config_profiles(&self) -> Profiles {
        Profiles {
            vec: codec::SUPPORTED_PROFILES.to_vec(),
        }
    }

    /// Returns the [`Entrypoint`]s supported for `profile`.
    ///
    /// Only bitstream decoding ([`Entrypoint::VLD`]) is implemented.
    pub fn query_config_entrypoints(&self, profile: Profile) -> Result<Entrypoints> {
        if !codec::SUPPORTED_PROFILES.contains(&profile) {
            return Err(Error::from(VAError::ERROR_UNSUPPORTED_PROFILE));
        }
        Ok(Entrypoints {
            vec: vec![Entrypoint::VLD],
        })
    }

    /// Creates a [`Config`] object.
    ///
    /// The profile is not checked here; creating a decode context with an unsupported profile
    /// fails instead.
    pub fn create_config(&mut self, profile: Profile, entrypoint: Entrypoint) -> Result<VAConfigID> {
        if entrypoint != Entrypoint::VLD {
            return Err(Error::from(VAError::ERROR_UNSUPPORTED_ENTRYPOINT));
        }

        let id = self.configs.allocate(Config {
            profile,
            entrypoint,
        })?;
        log::trace!("created config {id:#x} for {profile:?}/{entrypoint:?}");
        Ok(id)
    }

    pub fn destroy_config(&mut self, config_id: VAConfigID) -> Result<()> {
        self.configs
            .free(config_id)
            .map(drop)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONFIG))
    }

    pub fn config(&self, config_id: VAConfigID) -> Option<&Config> {
        self.configs.get(config_id)
    }
}
