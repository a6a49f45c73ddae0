//! Compiled-template cache with bounded-staleness refresh.
//!
//! # Responsibilities
//! - One compiled environment per view name, created lazily
//! - Skip the filesystem entirely while an entry is inside its refresh window
//! - Revalidate against the source mtime once the window has elapsed
//! - Keep serving the last good compile when recompilation fails
//!
//! Publication is replace-then-publish: readers see either the old or the
//! new compiled artifact, never a partially-built one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use minijinja::{AutoEscape, Environment};

use crate::error::TemplateError;
use crate::view::{apply_functions, default_functions, FunctionMap};

/// How long a compiled entry is served without consulting the filesystem.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Subdirectory of shared fragments loaded into every view's environment.
const LIB_DIR: &str = "lib";

/// A successfully compiled template set for one view. Immutable once
/// published.
#[derive(Debug)]
pub struct CompiledView {
    env: Environment<'static>,
    /// Monotonic compile time, drives the refresh window.
    compiled_at: Instant,
    /// Wall-clock compile time, compared against the source mtime.
    compiled_wall: SystemTime,
}

impl CompiledView {
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }
}

/// A successful resolution: the compiled handle, plus the refresh error when
/// the cache degraded to a stale handle because recompilation failed.
#[derive(Debug)]
pub struct Resolved {
    pub compiled: Arc<CompiledView>,
    pub refresh_error: Option<TemplateError>,
}

struct CacheEntry {
    path: PathBuf,
    /// Published artifact; replaced whole, never edited in place.
    compiled: ArcSwapOption<CompiledView>,
    /// Serializes refreshes for this entry only; other views never contend.
    refresh: Mutex<()>,
}

pub struct TemplateCache {
    template_dir: Option<PathBuf>,
    refresh_interval: Duration,
    /// Functions compiled into every environment (server defaults).
    functions: FunctionMap,
    entries: DashMap<String, Arc<CacheEntry>>,
}

impl TemplateCache {
    pub fn new(template_dir: Option<PathBuf>, functions: FunctionMap) -> Self {
        Self {
            template_dir,
            refresh_interval: REFRESH_INTERVAL,
            functions,
            entries: DashMap::new(),
        }
    }

    /// Override the refresh window. Zero makes every resolution revalidate.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Resolve the compiled template set for `view`.
    ///
    /// Returns the current handle, recompiling when the source has changed.
    /// A failed recompile of a previously valid view yields the stale handle
    /// together with the error, so the caller can log it; only a view that
    /// never compiled fails outright.
    pub fn resolve(&self, view: &str) -> Result<Resolved, TemplateError> {
        let template_dir = self.template_dir.as_deref().ok_or(TemplateError::NoTemplateDir)?;
        let entry = self
            .entries
            .entry(view.to_string())
            .or_insert_with(|| {
                Arc::new(CacheEntry {
                    path: template_dir.join(view),
                    compiled: ArcSwapOption::empty(),
                    refresh: Mutex::new(()),
                })
            })
            .clone();

        // Fast path: fresh entries skip the filesystem entirely.
        if let Some(compiled) = entry.compiled.load_full() {
            if compiled.compiled_at.elapsed() < self.refresh_interval {
                return Ok(Resolved {
                    compiled,
                    refresh_error: None,
                });
            }
        }

        let _guard = entry.refresh.lock().unwrap_or_else(PoisonError::into_inner);

        // Re-check under the lock: another task may have refreshed while we
        // waited.
        if let Some(compiled) = entry.compiled.load_full() {
            if compiled.compiled_at.elapsed() < self.refresh_interval
                || !source_changed(&entry.path, &compiled)
            {
                return Ok(Resolved {
                    compiled,
                    refresh_error: None,
                });
            }
        }

        match self.compile(view, &entry.path, template_dir) {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                entry.compiled.store(Some(fresh.clone()));
                Ok(Resolved {
                    compiled: fresh,
                    refresh_error: None,
                })
            }
            Err(err) => match entry.compiled.load_full() {
                // Availability over freshness: keep serving the last good
                // compile. The error still surfaces for logging.
                Some(stale) => Ok(Resolved {
                    compiled: stale,
                    refresh_error: Some(err),
                }),
                None => Err(err),
            },
        }
    }

    fn compile(
        &self,
        view: &str,
        path: &Path,
        template_dir: &Path,
    ) -> Result<CompiledView, TemplateError> {
        tracing::debug!(view, path = %path.display(), "compiling template");
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        default_functions(&mut env);
        apply_functions(&mut env, &self.functions);

        env.add_template_owned(view.to_string(), source)
            .map_err(|source| TemplateError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        load_lib(&mut env, template_dir)?;

        Ok(CompiledView {
            env,
            compiled_at: Instant::now(),
            compiled_wall: SystemTime::now(),
        })
    }
}

/// True when the source file is newer than the last successful compile.
/// Stat failures count as changed; the real error surfaces on the read.
fn source_changed(path: &Path, compiled: &CompiledView) -> bool {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(mtime) => mtime > compiled.compiled_wall,
        Err(_) => true,
    }
}

/// Load the shared fragment directory into the environment. Absence of the
/// directory is not an error; any other probe failure is.
fn load_lib(env: &mut Environment<'static>, template_dir: &Path) -> Result<(), TemplateError> {
    let lib = template_dir.join(LIB_DIR);
    let entries = match fs::read_dir(&lib) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(TemplateError::Lib {
                path: lib.display().to_string(),
                source: err,
            })
        }
    };
    for dirent in entries {
        let dirent = dirent.map_err(|source| TemplateError::Lib {
            path: lib.display().to_string(),
            source,
        })?;
        let path = dirent.path();
        if !path.is_file() {
            continue;
        }
        let name = dirent.file_name().to_string_lossy().into_owned();
        let source = fs::read_to_string(&path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        env.add_template_owned(name, source)
            .map_err(|source| TemplateError::Parse {
                path: path.display().to_string(),
                source,
            })?;
    }
    Ok(())
}
