//! Fixed key material for tests.
//!
//! Prime generation is slow in debug builds, so tests use pre-generated
//! pairs. Never use these keys outside tests.

#![allow(clippy::expect_used, reason = "fixtures are known-valid")]

use num_bigint_dig::BigUint;

use crate::keys::PrivateKey;

struct HostKeyHex {
    modulus: &'static str,
    private_exponent: &'static str,
    generator: &'static str,
}

const HOST_KEYS: [HostKeyHex; 3] = [
    HostKeyHex {
        modulus: concat!(
            "b6c81a986198be3512fd282a15d2b796755db065e1ea887b854ee7c46acb96f1",
            "89dffc8ba33c230ee6bfd65a61117753b1237b737fa77f41137f4903e0ff3bac",
            "8c01fac202f542aae4f266c54bf1b86316c357f93ce75706b4dfdf351fd6eb51",
            "032c71526007ee1a9dcde458f5474f69a5533bca7e31eb74daae3d4f0613c2db",
        ),
        private_exponent: concat!(
            "b67c6c090d0fa97f65b8f89ba3f4203508728486039adbaeaef68b70cfcaf9a5",
            "a728c8844571e9f29bb095fae004c724f8aadb3b020d2180c04d898164e68e14",
            "d199eb776cc6f2abbfbbf2d97cf542ac7fa0dc0c41b71cc3f6998e3a4eecb8dd",
            "d1197ad4f8aa0a4257abfac4cf90d2a0975e9306278c68c2371a3f0fa5ca9309",
        ),
        generator: concat!(
            "4723fe2c3d68486a879cae2714f8fbf82f84e6beaad59524f1d5909823be62e7",
            "0a2da949c8d00b8792199adc265b1cc5527d8850409740ccfd16631bc1dd66e6",
            "5367522b5e5352c04feb049276542abb729ac88d3e71cc0ca06b54b85e625064",
            "61ba8e0f50357efdab3e51c9a1adfeefd2d2bb516d1097af0a442da87ab1b03c",
        ),
    },
    HostKeyHex {
        modulus: concat!(
            "be3ac254c85f909ceca466092635ee7a9d85a7a79d5c4bd0ee4dda1d596fcbee",
            "3df900e25ce9f864c58c90cebedbdbe4ec12fa4629628bad94006663233431c5",
            "f4184df24dd44483dd590614ded8f8e16156471764da0dc3a459fb26ff270c78",
            "0a3a146b65e4ebb22470a8c08b67dc957c25752719b450ca7b02edd62abb1061",
        ),
        private_exponent: concat!(
            "a027c844a90e0c2a91f13716acdceb12c05c2e72a7c174f34a2eb15bd4589350",
            "d94c32ba618f7a591d18e331acee5d8bb655a3f03e17819179f17c422af95e8c",
            "df061a5293f97623547885c8cd910f694db8be3b0dfe51c6f119ed14022ab24e",
            "7225a97ae713f463c171e59605a4d4757f7cebcc9230683ac36bfac5da16bc21",
        ),
        generator: concat!(
            "bb989201c9892ee4931532dd17dde7da47297394a57305001fc26ace0556b120",
            "01bb508d00cf96fd65c766988178e48f336c19e6f8d602f4d918f5d000992fd1",
            "4825876d569ee4f888783b6cfef66da4261dcb72c0df5d384f907462f6ee8060",
            "8d9e9bc80f6ea63249df8a3982b667cfa1e72244296109963e1fb807e6a29191",
        ),
    },
    HostKeyHex {
        modulus: concat!(
            "b0856f7814493b503bb58052794344037b395364049cd9b2fbdfe2e7872c79e3",
            "ee612b510f372809493862822062c1b2e2d4c76c5c94b4ad9a48251d51cd851e",
            "c274186749f50622eeac9b70090834731a4ecec2b2e849f19b73628b3b8b0ce0",
            "c631de87b57d8c5b37627d2bf7df72e9754223b5818777fb60b40b0df13cefb7",
        ),
        private_exponent: concat!(
            "2d7891f84ab17a97f66990beae0207d925bae4a25515da7662af8f91b89e5a5f",
            "be9e453c4241210d135174feb43cfc4c8a65e9611e9027e2b865713a16426cd1",
            "cbcb878cd35018f4d0fe16be094e62be0461c155d9917dba633115018e47f7d8",
            "a863d16612bfdd1a986fca00b46a9b4485e261ba5f9f2c05e325099ea8a2b4f1",
        ),
        generator: concat!(
            "555b56cbb4ca05597f91e585120c84c02488f3875635369611e42a2b6e08eca8",
            "e5bb255a1f3217070e117801d098aaa05b5fd843536662c83f7c23fb395993d0",
            "21cf75374927f2fa0daae6e1db0d42d7f27b1cd70790a13c11187a2a38c530de",
            "4b90a6925386449109b62f3240d675859cbd2d60afa040090c85a940748cb3f3",
        ),
    },
];

/// Number of fixed 1024-bit host keys available from [`host_key`].
pub const HOST_KEY_COUNT: usize = HOST_KEYS.len();

/// Toy group: `n = 2773 = 47 * 59`, `e = 17`, `d = 157`, `g = 2`.
///
/// Too small to sign or wrap keys; only for commitment proofs.
pub fn toy_key() -> PrivateKey {
    PrivateKey::from_components(
        BigUint::from(2773u32),
        BigUint::from(17u32),
        BigUint::from(157u32),
        BigUint::from(2u32),
    )
    .expect("toy key is valid")
}

/// One of [`HOST_KEY_COUNT`] fixed 1024-bit host keys (`e = 65537`).
///
/// # Panics
///
/// Panics if `index >= HOST_KEY_COUNT`.
pub fn host_key(index: usize) -> PrivateKey {
    let hex = &HOST_KEYS[index];
    PrivateKey::from_components(
        parse(hex.modulus),
        BigUint::from(65_537u32),
        parse(hex.private_exponent),
        parse(hex.generator),
    )
    .expect("fixture key is valid")
}

fn parse(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).expect("fixture is valid hex")
}
