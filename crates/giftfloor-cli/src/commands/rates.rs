use crate::error::CliError;
use crate::output::Report;

use super::AppContext;

pub async fn run(context: &AppContext) -> Result<Report, CliError> {
    let rates = context.rates.rates().await;
    Ok(Report::Rates(rates.into()))
}
