// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::resource::ResourceError;

/// Errors that fail a whole pack load.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to open sound {}: {}", .path.display(), .io)]
    SourceMissing { path: PathBuf, io: io::Error },

    #[error("Unable to read sound {}: {}", .path.display(), .source)]
    Resource {
        path: PathBuf,
        source: ResourceError,
    },
}
