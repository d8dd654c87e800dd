//! `rate next | dataset | output`.

use anyhow::Result;

use crate::cli::RateCommand;
use crate::context::{cancel_on_ctrl_c, AppContext};

pub async fn execute(ctx: &AppContext, command: &RateCommand) -> Result<()> {
    let rating = ctx.rating();
    match command {
        RateCommand::Next => {
            let image = rating.fetch_next().await?;
            println!("Image {}: {}", image.id, image.url);
            println!("Rate it with: horde rate dataset {} <1-10>", image.id);
        }
        RateCommand::Dataset {
            image_id,
            rating: score,
            artifacts,
        } => {
            let receipt = rating
                .submit(image_id, *score, *artifacts, &cancel_on_ctrl_c())
                .await?;
            println!("Rated {image_id}, earned {} kudos.", receipt.reward);
        }
        RateCommand::Output {
            id,
            rating: score,
            artifacts,
        } => {
            let receipt = rating
                .rate_output(*id, *score, *artifacts, &cancel_on_ctrl_c())
                .await?;
            println!("Rated output #{id}, earned {} kudos.", receipt.reward);
        }
    }
    Ok(())
}
