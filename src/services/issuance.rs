use qrcode::render::svg;
use qrcode::QrCode;
use uuid::Uuid;

use crate::config::Config;
use crate::mailer::{ticket_confirmation_body, Mailer};
use crate::models::{Registration, Ticket};
use crate::utils::error::AppError;

/// Everything issuance produces is derived from stored data, so re-issuing
/// for an already-confirmed registration yields identical artifacts.

pub fn ticket_download_url(base_url: &str, registration_id: Uuid) -> String {
    format!("{base_url}/tickets/{registration_id}")
}

/// The URL the QR code points at: the admin-facing registration detail
/// page used to check people in at the door.
pub fn verification_url(base_url: &str, registration_id: Uuid) -> String {
    format!("{base_url}/admin/registrations/{registration_id}")
}

pub fn verification_qr_svg(base_url: &str, registration_id: Uuid) -> Result<String, AppError> {
    let code = QrCode::new(verification_url(base_url, registration_id).as_bytes())
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {e}")))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .build())
}

/// Hand the attendee their ticket: returns the stable download URL and
/// schedules the confirmation email.
pub fn issue(
    config: &Config,
    mailer: &Mailer,
    registration: &Registration,
    ticket: &Ticket,
) -> String {
    let ticket_url = ticket_download_url(&config.base_url, registration.id);

    mailer.send_detached(
        registration.email.clone(),
        "Your conference ticket",
        ticket_confirmation_body(&registration.first_name, &ticket.name, &ticket_url),
    );

    ticket_url
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://conf.example.com";

    #[test]
    fn download_url_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(
            ticket_download_url(BASE, id),
            ticket_download_url(BASE, id)
        );
        assert_eq!(
            ticket_download_url(BASE, id),
            format!("{BASE}/tickets/{id}")
        );
    }

    #[test]
    fn qr_encodes_the_admin_detail_url() {
        let id = Uuid::new_v4();
        let svg = verification_qr_svg(BASE, id).unwrap();
        assert!(svg.contains("<svg"));
        // Same input, same artifact: issuance never mints new identifiers.
        assert_eq!(svg, verification_qr_svg(BASE, id).unwrap());
    }
}
