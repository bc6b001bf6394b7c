//! Pairing taps: bind the tapped card to the session's student.

use chrono::Utc;
use rollcall_core::error::CoreError;
use rollcall_core::outbox::{GuardianNotice, EVENT_PAIRING_COMPLETED};
use rollcall_core::pairing::{resolve_card_binding, CardBinding, PairingError, PairingSession};
use rollcall_db::models::device::Device;
use rollcall_db::models::student::Student;
use rollcall_db::repositories::StudentRepo;

use super::{record_notice, TapOutcome, TapResponse};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Complete `session` with `card_id`.
///
/// The binding and its `pairing.completed` outbox row commit together. A
/// conflict rolls back and leaves the session open so the operator can try
/// another card before it expires.
pub async fn complete(
    state: &AppState,
    device: &Device,
    session: PairingSession,
    card_id: &str,
) -> AppResult<TapResponse> {
    let student = match StudentRepo::find_by_id(&state.pool, session.student_id).await? {
        Some(s) if s.is_active && s.tenant_id == session.tenant_id => s,
        _ => {
            state.pairing.cancel(device.id);
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Student",
                id: session.student_id,
            }));
        }
    };

    let mut tx = state.pool.begin().await?;

    let owner = StudentRepo::lock_card_owner(&mut *tx, card_id).await?;
    if let Some(owner) = &owner {
        if owner.tenant_id != session.tenant_id {
            tracing::warn!(
                device_id = device.id,
                tenant_id = session.tenant_id,
                "Pairing tap with a card registered to another tenant",
            );
            return Err(AppError::Core(CoreError::Conflict(
                "Card is registered to another school".into(),
            )));
        }
    }

    let binding = resolve_card_binding(
        state.config.pairing.rebind_policy,
        session.student_id,
        owner.as_ref().map(Student::as_card_owner).as_ref(),
    )?;

    match binding {
        CardBinding::AlreadyOwn => {}
        CardBinding::Bind => bind(&mut *tx, &student, card_id).await?,
        CardBinding::Rebind { from_student_id } => {
            StudentRepo::clear_card(&mut *tx, from_student_id).await?;
            bind(&mut *tx, &student, card_id).await?;
            tracing::info!(
                from_student_id,
                to_student_id = student.id,
                "Card moved between students",
            );
        }
    }

    let now = Utc::now();
    if binding != CardBinding::AlreadyOwn {
        let notice = GuardianNotice {
            tenant_id: student.tenant_id,
            student_id: student.id,
            student_name: student.name.clone(),
            class_name: student.class_name.clone(),
            occurred_at: state.clock.local(now),
            status: None,
        };
        record_notice(&mut *tx, EVENT_PAIRING_COMPLETED, &notice).await?;
    }

    tx.commit().await?;

    // A cancel that raced this tap has already removed the session; the
    // binding stands either way.
    state.pairing.complete(device.id, session.session_id);

    tracing::info!(
        device_id = device.id,
        student_id = student.id,
        "Pairing completed",
    );

    Ok(TapResponse {
        outcome: TapOutcome::Paired,
        status: None,
        checked_out: false,
        student_id: student.id,
        student_name: student.name.clone(),
        time: now,
        message: format!("Card paired with {}", student.name),
    })
}

async fn bind(
    conn: &mut sqlx::PgConnection,
    student: &Student,
    card_id: &str,
) -> AppResult<()> {
    if !StudentRepo::bind_card(conn, student.id, card_id).await? {
        return Err(PairingError::StudentAlreadyPaired {
            student_id: student.id,
        }
        .into());
    }
    Ok(())
}
