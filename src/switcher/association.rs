use crate::config::SceneConfig;
use crate::error::ConfigError;

/// Analyzed camera index → display camera indices, in configured order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssociationMap {
    displays: Vec<Vec<usize>>,
}

impl AssociationMap {
    /// Resolves the configured names to camera indices and checks that every
    /// analyzed camera maps to at least one displayable camera.
    pub fn from_config(config: &SceneConfig) -> Result<Self, ConfigError> {
        let mut displays = vec![Vec::new(); config.cameras.len()];
        for (idx, cam) in config.cameras.iter().enumerate() {
            if !cam.role.is_analyzed() {
                continue;
            }
            let names = config
                .associations
                .get(&cam.name)
                .filter(|names| !names.is_empty())
                .ok_or_else(|| ConfigError::MissingAssociation(cam.name.clone()))?;
            for name in names {
                let target = config
                    .camera_index(name)
                    .ok_or_else(|| ConfigError::UnknownCamera {
                        context: format!("association of '{}'", cam.name),
                        name: name.clone(),
                    })?;
                if !config.cameras[target].role.is_displayable() {
                    return Err(ConfigError::NotDisplayable {
                        analyzed: cam.name.clone(),
                        display: name.clone(),
                    });
                }
                displays[idx].push(target);
            }
        }
        Ok(Self { displays })
    }

    /// Builds a map from raw indices. Used by tests and embedders that do not load a scene file.
    pub fn from_indices(displays: Vec<Vec<usize>>) -> Self {
        Self { displays }
    }

    /// Display cameras of `analyzed`, empty for unknown indices and display-only cameras.
    pub fn displays_for(&self, analyzed: usize) -> &[usize] {
        self.displays.get(analyzed).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every index in `analyzed` has at least one association.
    pub fn covers(&self, analyzed: impl IntoIterator<Item = usize>) -> bool {
        analyzed
            .into_iter()
            .all(|idx| !self.displays_for(idx).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_indices() {
        let cfg = SceneConfig::from_json(
            r#"{
                "cameras": [
                    { "name": "top1", "uri": "a.y4m", "role": "analyze" },
                    { "name": "top2", "uri": "b.y4m", "role": "both" },
                    { "name": "wide", "uri": "c.y4m", "role": "display" }
                ],
                "associations": { "top1": ["wide", "top2"], "top2": ["top2"] }
            }"#,
        )
        .unwrap();
        let map = AssociationMap::from_config(&cfg).unwrap();
        assert_eq!(map.displays_for(0), &[2, 1]);
        assert_eq!(map.displays_for(1), &[1]);
        assert!(map.displays_for(2).is_empty());
        assert!(map.displays_for(9).is_empty());
        assert!(map.covers([0, 1]));
        assert!(!map.covers([0, 2]));
    }
}
