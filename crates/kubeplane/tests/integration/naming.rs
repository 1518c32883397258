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

//! Names of provisioned resources.

use kubeplane::naming::{self, MAX_COMBINED_LENGTH};

use crate::fixtures::Harness;

#[tokio::test]
async fn test_provisioned_names_fit_combined_length() {
    let harness = Harness::new();
    let organizations = ["Acme Corp", "x", "Global Mega Industries Incorporated"];

    for organization in organizations {
        let (cluster, _) = harness.create_cluster(organization, "Production EU");
        harness.drain().await;

        let shoot = harness.client.shoot(cluster.id).unwrap();
        let project = naming::project_name(organization);
        assert_eq!(project.len() + shoot.name.len(), MAX_COMBINED_LENGTH);
        assert_eq!(shoot.namespace, format!("garden-{}", project));
    }
}

#[test]
fn test_resource_names_differ_for_same_input() {
    let first = naming::resource_name("Acme Corp", "prod");
    let second = naming::resource_name("Acme Corp", "prod");
    assert_eq!(first.len(), second.len());
    assert_ne!(first, second);
    assert_eq!(naming::project_name("Acme Corp"), naming::project_name("Acme Corp"));
}
