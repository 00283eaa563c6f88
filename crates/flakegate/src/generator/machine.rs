use tracing::{error, info};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Reduces arbitrary bytes to a machine ID in `[0, 2^machine_bits - 1]`.
///
/// The bytes are hashed with 64-bit FNV-1a, so the mapping is stable across
/// builds, platforms and restarts.
pub fn machine_id_from_bytes(bytes: &[u8], machine_bits: u32) -> i64 {
    let hash = bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    });
    let modulus = 1u64 << machine_bits.min(63);
    (hash % modulus) as i64
}

/// Derives a machine ID from the host name.
///
/// Two hosts can hash to the same value; deployments that need a hard
/// uniqueness guarantee must assign machine IDs explicitly. Returns 0 if the
/// host name cannot be read.
pub fn derive_machine_id(machine_bits: u32) -> i64 {
    let host = match hostname::get() {
        Ok(host) => host,
        Err(e) => {
            error!(error = %e, "failed to read host name, falling back to machine id 0");
            return 0;
        }
    };
    let host = host.to_string_lossy();
    let machine_id = machine_id_from_bytes(host.as_bytes(), machine_bits);
    info!(%host, machine_id, machine_bits, "derived machine id");
    machine_id
}
