//! `interrogate`.

use std::path::Path;

use anyhow::Result;
use horde_client::messages::InterrogationForm;

use super::generate::load_as_webp;
use crate::context::{cancel_on_ctrl_c, AppContext};

pub async fn execute(ctx: &AppContext, source: &str, forms: &[String]) -> Result<()> {
    let forms = forms
        .iter()
        .map(|f| f.trim().parse::<InterrogationForm>())
        .collect::<Result<Vec<_>, _>>()?;

    // Local files are uploaded inline; anything else is passed as a URL.
    let path = Path::new(source);
    let source_image = if path.is_file() {
        load_as_webp(path)?
    } else {
        source.to_string()
    };

    let outcome = ctx
        .interrogation()
        .run(&source_image, &forms, &cancel_on_ctrl_c())
        .await?;

    for form in &outcome.forms {
        let result = match &form.result {
            Some(value) => serde_json::to_string_pretty(value)?,
            None => format!("({})", form.state),
        };
        println!("{:?}: {result}", form.form);
    }
    Ok(())
}
