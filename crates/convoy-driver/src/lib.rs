mod converter;
mod driver;

pub use converter::{CommandConverter, Converter, ConverterOutput};
pub use driver::{BatchConversionDriver, Reporter, SilentReporter};
