use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use log::debug;

use crate::capi::CApi;
use crate::error::{Error, Result};
use crate::handle::{Handle, Toplevel};
use crate::vcd::Vcd;

/// Design name Yosys uses unless `-name` is passed to `write_cxxrtl`.
pub const DEFAULT_DESIGN_NAME: &str = "cxxrtl_design";

#[derive(Debug, Clone)]
pub struct LibraryOptions {
    /// Prefix of the `<design_name>_create` entry point.
    pub design_name: String,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            design_name: DEFAULT_DESIGN_NAME.to_owned(),
        }
    }
}

impl LibraryOptions {
    pub fn design_name(mut self, design_name: impl Into<String>) -> Self {
        self.design_name = design_name.into();
        self
    }
}

/// A loaded CXXRTL shared library with every entry point resolved.
pub struct Library {
    api: CApi,
    path: PathBuf,
    design_name: String,
    // Keeps the code behind `api` mapped; must not be dropped before it.
    _library: libloading::Library,
}

impl Library {
    /// Load `path` with the default design name.
    ///
    /// # Safety
    ///
    /// Loading runs the library's initializers, and the exported symbols are
    /// trusted to follow the CXXRTL C API signatures.
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self> {
        // SAFETY: forwarded to the caller.
        unsafe { Self::open_with(path, LibraryOptions::default()) }
    }

    /// Load `path` and resolve every entry point eagerly.
    ///
    /// Either the library loads with all required symbols present, or an
    /// error naming the first missing one is returned.
    ///
    /// # Safety
    ///
    /// See [`Library::open`].
    pub unsafe fn open_with(path: impl AsRef<Path>, options: LibraryOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!(
            "loading CXXRTL library {} (design {})",
            path.display(),
            options.design_name
        );

        // SAFETY: forwarded to the caller.
        let library = unsafe { libloading::Library::new(path) }.map_err(|source| Error::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let api = unsafe { CApi::resolve(&library, path, &options.design_name) }?;

        Ok(Library {
            api,
            path: path.to_path_buf(),
            design_name: options.design_name,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn design_name(&self) -> &str {
        &self.design_name
    }

    /// Raw entry points, for calls the safe wrappers do not cover.
    pub fn api(&self) -> &CApi {
        &self.api
    }

    /// Instantiate the design by calling `<design_name>_create`.
    pub fn create_toplevel(&self) -> Result<Toplevel<'_>> {
        let raw = unsafe { (self.api.design_create)() };
        let raw = NonNull::new(raw).ok_or(Error::NullHandle("<design>_create"))?;
        Ok(Toplevel::from_raw(self, raw))
    }

    /// `create(create_toplevel())`.
    pub fn instantiate(&self) -> Result<Handle<'_>> {
        self.create_toplevel()?.create()
    }

    pub fn vcd_create(&self) -> Result<Vcd<'_>> {
        let raw = unsafe { (self.api.vcd_create)() };
        let raw = NonNull::new(raw).ok_or(Error::NullHandle("cxxrtl_vcd_create"))?;
        Ok(Vcd::from_raw(self, raw))
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.path)
            .field("design_name", &self.design_name)
            .finish_non_exhaustive()
    }
}
