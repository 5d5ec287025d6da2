use anchor_crypto::{decrypt, encrypt, generate_data_key};
use proptest::prelude::*;

proptest! {
    #[test]
    fn roundtrip_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let key = generate_data_key().unwrap();
        let blob = encrypt(key.as_bytes(), &data).unwrap();
        let recovered = decrypt(key.as_bytes(), &blob).unwrap();
        prop_assert_eq!(data, recovered);
    }
}
