//! Data preprocessing module
//!
//! - Kelvin to Celsius feature engineering and column drops
//! - Ordinal encoding with declared category orders
//! - Min-max scaling
//! - [`ColumnTransformer`] combining both into one fitted object

mod encoder;
mod features;
mod pipeline;
mod scaler;

pub use encoder::OrdinalEncoder;
pub use features::engineer_features;
pub use pipeline::ColumnTransformer;
pub use scaler::MinMaxScaler;

use crate::error::Result;
use crate::schema::SchemaConfig;

/// Unfitted preprocessor for a schema
pub fn build_preprocessor(schema: &SchemaConfig) -> Result<ColumnTransformer> {
    ColumnTransformer::from_schema(schema)
}
