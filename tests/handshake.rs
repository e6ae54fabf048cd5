//! End-to-end context establishment through the generic GSS surface.

use gss::{acquire_cred, init_sec_context, ContextFlags, CredUsage, Name, Oid};

fn target() -> Name {
    Name::kerberos_principal("host/example@X")
}

#[test_log::test]
fn no_mutual_initiator_completes_in_one_round() {
    let cred = acquire_cred(Some(&Name::kerberos_principal("alice@X")), None, None, CredUsage::Initiate).unwrap();

    let mut ctx = None;
    let step = init_sec_context(
        Some(&cred),
        &mut ctx,
        &target(),
        Some(&gss::oid::kerberos_v5_mechanism()),
        ContextFlags::INTEG,
        None,
        None,
    )
    .unwrap();

    assert!(!step.continue_needed);
    let token = step.output_token.expect("a complete init call still emits a token");
    assert!(!token.is_empty());

    let (oid, payload) = gss::token::decode(&token).unwrap();
    assert_eq!(oid, gss::oid::kerberos_v5_mechanism());
    assert_eq!(&payload[..2], &[0x01, 0x00]);
    assert!(ctx.unwrap().is_established());
}

#[test_log::test]
fn mutual_auth_initiator_and_acceptor_complete_in_two_round_trips() {
    let init_cred = acquire_cred(Some(&Name::kerberos_principal("alice@X")), None, None, CredUsage::Initiate).unwrap();
    let accept_cred = acquire_cred(Some(&target()), None, None, CredUsage::Accept).unwrap();

    let mut init_ctx = None;
    let step1 = init_sec_context(
        Some(&init_cred),
        &mut init_ctx,
        &target(),
        Some(&gss::oid::kerberos_v5_mechanism()),
        ContextFlags::MUTUAL | ContextFlags::INTEG,
        None,
        None,
    )
    .unwrap();
    assert!(step1.continue_needed);
    let ap_req = step1.output_token.unwrap();

    let mut accept_ctx = None;
    let step2 = gss::accept_sec_context(Some(&accept_cred), &mut accept_ctx, &ap_req, None).unwrap();
    assert!(!step2.continue_needed);
    assert!(step2.ret_flags.contains(ContextFlags::MUTUAL));
    let ap_rep = step2.output_token.expect("mutual auth always yields an AP-REP");

    let step3 = init_sec_context(
        Some(&init_cred),
        &mut init_ctx,
        &target(),
        None,
        ContextFlags::MUTUAL | ContextFlags::INTEG,
        Some(&ap_rep),
        None,
    )
    .unwrap();
    assert!(!step3.continue_needed);
    assert!(step3.output_token.is_none());

    assert!(init_ctx.unwrap().is_established());
    assert!(accept_ctx.unwrap().is_established());
}

#[test_log::test]
fn unknown_mechanism_is_rejected_before_any_context_is_created() {
    let bogus = Oid::from_dotted("1.2.3.4").unwrap();
    let mut ctx = None;
    let result = init_sec_context(None, &mut ctx, &target(), Some(&bogus), ContextFlags::empty(), None, None);
    assert!(matches!(result, Err(gss::Error::BadMech)));
    assert!(ctx.is_none());
}
