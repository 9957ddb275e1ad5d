//! Parameter builder: applies raw points onto cloned base configurations

use super::{Field, FieldNaming, FieldTable, ModelParameters};
use crate::error::{GridError, Result};
use crate::space::{HyperValue, RawPoint};

/// Turns raw points into concrete configurations.
///
/// The base configuration is cloned for every point; neither the base nor
/// the point is ever modified.
#[derive(Debug, Clone)]
pub struct ParamsBuilder<P> {
    fields: FieldTable<P>,
    naming: FieldNaming,
}

impl<P: ModelParameters> ParamsBuilder<P> {
    pub fn new(naming: FieldNaming) -> Self {
        Self {
            fields: P::fields(),
            naming,
        }
    }

    pub fn naming(&self) -> FieldNaming {
        self.naming
    }

    pub fn fields(&self) -> &FieldTable<P> {
        &self.fields
    }

    fn field(&self, name: &str) -> Option<&Field<P>> {
        self.fields.get(self.naming.resolve(name))
    }

    /// Build the concrete configuration selected by `point`.
    ///
    /// `null` values keep the base value. A model seed carried by the point
    /// is applied first, so a searched seed still wins.
    pub fn build(&self, base: &P, point: &RawPoint) -> Result<P> {
        let mut params = base.clone();
        if let Some(seed) = point.model_seed() {
            if let Some(field) = P::seed_field().and_then(|name| self.fields.get(name)) {
                field.write(&mut params, &HyperValue::Int(seed))?;
            }
        }
        for (name, value) in point.iter() {
            if value.is_null() {
                continue;
            }
            let field = self
                .field(name)
                .ok_or_else(|| GridError::unknown_field(name, base.algo_name()))?;
            field.write(&mut params, value)?;
        }
        Ok(params)
    }

    /// Check that every searched name is assignable and not already pinned
    /// to a non-default value by the base configuration.
    pub fn validate_space(&self, base: &P, names: &[String]) -> Result<()> {
        let defaults = P::default();
        for name in names {
            let field = self.field(name).ok_or_else(|| {
                GridError::SpaceConstruction(format!(
                    "Parameter '{}' is not supported by {}",
                    name,
                    base.algo_name()
                ))
            })?;
            if field.read(base) != field.read(&defaults) {
                return Err(GridError::SpaceConstruction(format!(
                    "Grid search parameter '{}' is set in both model parameters and in the hyperparameter search space",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TreeParams;
    use std::sync::Arc;

    fn point(pairs: &[(&str, HyperValue)]) -> RawPoint {
        let names: Arc<[String]> = pairs.iter().map(|(n, _)| n.to_string()).collect();
        RawPoint::new(names, pairs.iter().map(|(_, v)| v.clone()).collect())
    }

    #[test]
    fn test_build_leaves_base_untouched() {
        let builder = ParamsBuilder::<TreeParams>::new(FieldNaming::Consistent);
        let base = TreeParams::default();
        let p = point(&[("ntrees", 7.into()), ("_max_depth", 3.into())]);

        let built = builder.build(&base, &p).unwrap();
        assert_eq!(built.ntrees, 7);
        assert_eq!(built.max_depth, 3);
        assert_eq!(base, TreeParams::default());
    }

    #[test]
    fn test_null_keeps_base_value() {
        let builder = ParamsBuilder::<TreeParams>::new(FieldNaming::Consistent);
        let base = TreeParams {
            learn_rate: 0.3,
            ..Default::default()
        };
        let built = builder
            .build(&base, &point(&[("learn_rate", HyperValue::Null)]))
            .unwrap();
        assert_eq!(built.learn_rate, 0.3);
    }

    #[test]
    fn test_unknown_name_is_point_error() {
        let builder = ParamsBuilder::<TreeParams>::new(FieldNaming::Exact);
        let err = builder
            .build(&TreeParams::default(), &point(&[("_ntrees", 1.into())]))
            .unwrap_err();
        assert!(matches!(err, GridError::PointConstruction { .. }));

        let err = builder
            .build(&TreeParams::default(), &point(&[("ntrees", "many".into())]))
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidValue { .. }));
    }

    #[test]
    fn test_float_too_large_for_int_field() {
        let builder = ParamsBuilder::<TreeParams>::new(FieldNaming::Consistent);
        let err = builder
            .build(&TreeParams::default(), &point(&[("ntrees", 1e20.into())]))
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidValue { ref name, .. } if name == "ntrees"));
        assert!(err.is_point_failure());
    }

    #[test]
    fn test_model_seed_applied_before_point_values() {
        let builder = ParamsBuilder::<TreeParams>::new(FieldNaming::Consistent);
        let base = TreeParams::default();

        let seeded = point(&[("ntrees", 7.into())]).with_model_seed(43);
        assert_eq!(builder.build(&base, &seeded).unwrap().seed, 43);

        let searched = point(&[("seed", 5.into())]).with_model_seed(43);
        assert_eq!(builder.build(&base, &searched).unwrap().seed, 5);
    }

    #[test]
    fn test_validate_space() {
        let builder = ParamsBuilder::<TreeParams>::new(FieldNaming::Consistent);
        let base = TreeParams::default();
        assert!(builder.validate_space(&base, &["ntrees".to_string()]).is_ok());
        assert!(builder.validate_space(&base, &["alpha".to_string()]).is_err());

        let pinned = TreeParams {
            ntrees: 500,
            ..Default::default()
        };
        assert!(matches!(
            builder.validate_space(&pinned, &["ntrees".to_string()]),
            Err(GridError::SpaceConstruction(_))
        ));
    }
}
