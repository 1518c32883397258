/*
 *  Copyright 2025-2026 Kubeplane Maintainers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Deterministic naming for external projects and shoots.
//!
//! Gardener limits the combined length of a project name and a shoot name,
//! and both must be lowercase DNS labels. The rules here are:
//!
//! - only `[a-z0-9]` survive filtering; a leading digit (or an empty result)
//!   gets a letter prefix
//! - names shorter than their floor are padded with hex digits taken from a
//!   SHA-256 of the raw input, so padding is deterministic
//! - names longer than their ceiling are truncated
//! - `project_name(org).len() + resource_name(org, cluster).len()` is always
//!   [`MAX_COMBINED_LENGTH`]
//!
//! [`project_name`] is a pure function of the organization name so repeated
//! project ensures agree. [`resource_name`] ends in a random suffix so two
//! clusters created concurrently with the same name never collide.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Shortest project name produced.
pub const PROJECT_NAME_MIN_LENGTH: usize = 3;

/// Longest project name Gardener accepts.
pub const PROJECT_NAME_MAX_LENGTH: usize = 10;

/// Fixed total of project name length plus resource name length.
pub const MAX_COMBINED_LENGTH: usize = 21;

/// Length of the random tail of a resource name.
pub const RESOURCE_SUFFIX_LENGTH: usize = 5;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Derives the external project name for an organization.
pub fn project_name(organization_name: &str) -> String {
    fit(
        organization_name,
        'p',
        PROJECT_NAME_MIN_LENGTH,
        PROJECT_NAME_MAX_LENGTH,
    )
}

/// Generates a fresh shoot name for a cluster owned by `organization_name`.
///
/// The length is whatever remains of [`MAX_COMBINED_LENGTH`] after the
/// organization's project name.
pub fn resource_name(organization_name: &str, cluster_name: &str) -> String {
    let budget = MAX_COMBINED_LENGTH - project_name(organization_name).len();
    let stem_length = budget - RESOURCE_SUFFIX_LENGTH;

    let mut name = fit(cluster_name, 'c', stem_length, stem_length);
    name.push_str(&random_suffix(RESOURCE_SUFFIX_LENGTH));
    name
}

/// Filters, pads and truncates `input` into `[min, max]` characters.
fn fit(input: &str, lead: char, min: usize, max: usize) -> String {
    let mut name: String = input
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name.insert(0, lead);
    }

    if name.len() < min {
        let digest = hex::encode(Sha256::digest(input.as_bytes()));
        let missing = min - name.len();
        name.extend(digest.chars().take(missing));
    }

    name.truncate(max);
    name
}

fn random_suffix(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..SUFFIX_ALPHABET.len());
            char::from(SUFFIX_ALPHABET[idx])
        })
        .collect()
}
