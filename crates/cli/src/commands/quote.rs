//! Price local PDF files against an agency and optionally place the order.

use std::path::{Path, PathBuf};

use copyhub_client::{FileUpload, OrderConfigurator, UploadedFile, count_pages};
use copyhub_core::{AgencyId, AgencyProduct, ColorOption, PaperType, PrintType, format_money};

use super::{CliError, Context, Result};
use crate::output;

/// Print options as typed on the command line.
#[derive(Debug, Default, Clone)]
pub struct JobOptions {
    pub paper: Option<String>,
    pub color: Option<String>,
    pub sides: Option<String>,
    pub copies: u32,
}

/// A local file read for quoting.
#[derive(Debug)]
struct LocalFile {
    name: String,
    data: Vec<u8>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<LocalFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| CliError::Invalid(format!("{}: {e}", path.display())))?;
        files.push(LocalFile {
            name: file_name(path),
            data,
        });
    }
    Ok(files)
}

fn parse_option<T>(raw: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|raw| raw.parse::<T>().map_err(|e| CliError::Invalid(e.to_string())))
        .transpose()
}

/// Build the configurator for a job from an agency's price list.
fn configure(
    agency_id: AgencyId,
    products: Vec<AgencyProduct>,
    files: &[LocalFile],
    options: &JobOptions,
) -> Result<OrderConfigurator> {
    let mut job = OrderConfigurator::new(agency_id, products);
    for (index, file) in files.iter().enumerate() {
        job.add_file(UploadedFile::from_count(
            file.name.clone(),
            index.to_string(),
            file.data.len(),
            count_pages(&file.data),
        ));
    }

    job.set_paper_type(parse_option::<PaperType>(options.paper.as_deref())?);
    job.set_color_option(parse_option::<ColorOption>(options.color.as_deref())?);
    job.set_print_type(parse_option::<PrintType>(options.sides.as_deref())?);
    job.set_copies(options.copies)
        .map_err(|e| CliError::Invalid(e.to_string()))?;
    Ok(job)
}

fn print_quote(job: &OrderConfigurator) -> Result<()> {
    for file in job.files() {
        output::line(format!("{:>5} pages  {}", file.page_count, file.file_name))?;
    }
    if let Some(options) = job.options() {
        output::line(format!("options:  {options}"))?;
    }
    output::line(format!("pages:    {}", job.total_pages()))?;
    output::line(format!("copies:   {}", job.copies()))?;
    output::line(format!("per page: {}", format_money(job.price_per_page())))?;
    output::line(format!("total:    {}", format_money(job.total_price())))?;

    for warning in job.warnings() {
        tracing::warn!("{warning}");
    }
    Ok(())
}

/// Quote `paths` at an agency. With `site_url`, also place the order and
/// print the hosted checkout link.
pub async fn run(
    ctx: &Context,
    agency_id: AgencyId,
    paths: &[PathBuf],
    options: &JobOptions,
    site_url: Option<&url::Url>,
) -> Result<()> {
    let files = read_files(paths).await?;
    let products = ctx.api.list_agency_products(&ctx.session, agency_id).await?;
    let job = configure(agency_id, products, &files, options)?;
    print_quote(&job)?;

    let Some(site_url) = site_url else {
        ctx.persist().await?;
        return Ok(());
    };

    ctx.require_identity().await?;
    let request = job
        .to_order_request()
        .map_err(|reason| CliError::Invalid(reason.to_string()))?;
    let uploads = files
        .into_iter()
        .map(|file| FileUpload::pdf(file.name, file.data))
        .collect();

    let order = ctx.api.create_order(&ctx.session, &request, uploads).await?;
    output::line(format!("order:    {}", order.order_code))?;

    let success = checkout_return(site_url, "checkout/success?session_id={CHECKOUT_SESSION_ID}")?;
    let cancel = checkout_return(site_url, "checkout/cancel?payment_canceled=true")?;
    let checkout = ctx
        .api
        .create_checkout_session(&ctx.session, &order.order_code, &success, &cancel)
        .await;
    ctx.persist().await?;

    match checkout {
        Ok(url) => output::line(format!("pay at:   {url}"))?,
        Err(e) => {
            tracing::warn!(error = %e, "Order placed but checkout could not start");
            output::line("The order is placed; pay for it from your account page.")?;
        }
    }
    Ok(())
}

/// Return address on the site. The placeholder is filled in by the payment
/// provider, so it must survive unescaped.
fn checkout_return(site_url: &url::Url, path: &str) -> Result<String> {
    let base = site_url.as_str().trim_end_matches('/');
    let joined = format!("{base}/{path}");
    url::Url::parse(&joined).map_err(|e| CliError::Invalid(format!("Invalid site URL: {e}")))?;
    Ok(joined)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copyhub_client::BlockReason;
    use copyhub_core::{AgencyProductId, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn price_list() -> Vec<AgencyProduct> {
        vec![AgencyProduct {
            id: AgencyProductId::new(1),
            agency_id: AgencyId::new(3),
            product_id: ProductId::new(10),
            paper_type: PaperType::A4,
            color_option: ColorOption::BlackAndWhite,
            print_type: PrintType::OneSided,
            price: Decimal::new(10, 2),
        }]
    }

    fn options() -> JobOptions {
        JobOptions {
            paper: Some(PaperType::A4.label().to_string()),
            color: Some(ColorOption::BlackAndWhite.label().to_string()),
            sides: Some(PrintType::OneSided.label().to_string()),
            copies: 2,
        }
    }

    #[test]
    fn test_unreadable_file_counts_zero_pages() {
        let files = vec![LocalFile {
            name: "notes.txt".to_string(),
            data: b"plain text".to_vec(),
        }];
        let job = configure(AgencyId::new(3), price_list(), &files, &options()).unwrap();

        assert_eq!(job.total_pages(), 0);
        assert_eq!(job.price_per_page(), Decimal::new(10, 2));
        assert_eq!(job.total_price(), Decimal::ZERO);
        assert_eq!(job.to_order_request().unwrap_err(), BlockReason::NoPages);
        assert_eq!(job.warnings().len(), 1);
    }

    #[test]
    fn test_bad_option_is_rejected() {
        let bad = JobOptions {
            paper: Some("B9".to_string()),
            ..options()
        };
        assert!(matches!(
            configure(AgencyId::new(3), price_list(), &[], &bad),
            Err(CliError::Invalid(_))
        ));
    }

    #[test]
    fn test_copies_out_of_range() {
        let bad = JobOptions {
            copies: 0,
            ..options()
        };
        assert!(configure(AgencyId::new(3), price_list(), &[], &bad).is_err());
    }

    #[test]
    fn test_checkout_return_keeps_placeholder() {
        let site = url::Url::parse("https://copyhub.example/").unwrap();
        assert_eq!(
            checkout_return(&site, "checkout/success?session_id={CHECKOUT_SESSION_ID}").unwrap(),
            "https://copyhub.example/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn test_file_name_from_path() {
        assert_eq!(file_name(Path::new("/tmp/thesis.pdf")), "thesis.pdf");
    }
}
