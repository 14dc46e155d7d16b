use std::time::Duration;

use integration_tests::{
    sim_bus::{SimBus, SimBusReceiver, SimBusSender},
    sim_device::SimDevice,
};
use sdolink_client::{SdoClient, SdoClientError};
use sdolink_common::{objects::AccessType, sdo::AbortCode};

mod utils;
use utils::{init_logging, BusLogger};

const NODE_ID: u8 = 1;

fn setup(device: SimDevice) -> (SdoClient<SimBusSender, SimBusReceiver>, SimBus) {
    init_logging();
    let bus = SimBus::new(vec![device]);
    let (sender, receiver) = bus.new_pair();
    let client =
        SdoClient::new_std(NODE_ID, sender, receiver).with_timeout(Duration::from_millis(50));
    (client, bus)
}

#[tokio::test]
async fn test_expedited_round_trip() {
    let (mut client, bus) = setup(SimDevice::new(NODE_ID).with_object(
        0x3000,
        0,
        AccessType::Rw,
        &[0; 4],
    ));
    let _logger = BusLogger::new(bus.new_receiver());

    client
        .download(0x3000, 0, &[0xa, 0xb, 0xc, 0xd])
        .await
        .unwrap();
    let read = client.upload(0x3000, 0).await.unwrap();
    assert_eq!(vec![0xa, 0xb, 0xc, 0xd], read);
}

#[tokio::test]
async fn test_segmented_round_trip() {
    let (mut client, bus) = setup(SimDevice::new(NODE_ID).with_object(
        0x3001,
        0,
        AccessType::Rw,
        &[0; 23],
    ));

    // Spans several segments, with a partial one at the end
    let data: Vec<u8> = (1..=23).collect();
    client.download(0x3001, 0, &data).await.unwrap();
    assert_eq!(Some(&data[..]), bus.device(NODE_ID).unwrap().value(0x3001, 0));

    let read = client.upload(0x3001, 0).await.unwrap();
    assert_eq!(data, read);
}

#[tokio::test]
async fn test_segment_exact_multiple() {
    let data: Vec<u8> = (0..14).map(|i| i * 3).collect();
    let (mut client, _bus) = setup(SimDevice::new(NODE_ID).with_object(
        0x3002,
        0,
        AccessType::Ro,
        &data,
    ));
    assert_eq!(data, client.upload(0x3002, 0).await.unwrap());
}

#[tokio::test]
async fn test_server_aborts() {
    let (mut client, _bus) = setup(
        SimDevice::new(NODE_ID)
            .with_object(0x3000, 0, AccessType::Ro, &[1, 2])
            .with_object(0x3001, 0, AccessType::Wo, &[1, 2])
            .with_object(0x3002, 0, AccessType::Rw, &[1, 2]),
    );

    assert_eq!(
        Err(SdoClientError::ServerAbort {
            abort_code: AbortCode::NoSuchObject as u32
        }),
        client.upload(0x4000, 0).await
    );
    assert_eq!(
        Err(SdoClientError::ServerAbort {
            abort_code: AbortCode::ReadOnly as u32
        }),
        client.download(0x3000, 0, &[0, 0]).await
    );
    assert_eq!(
        Err(SdoClientError::ServerAbort {
            abort_code: AbortCode::WriteOnly as u32
        }),
        client.upload(0x3001, 0).await
    );
    assert_eq!(
        Err(SdoClientError::ServerAbort {
            abort_code: AbortCode::DataTypeMismatchLengthHigh as u32
        }),
        client.download(0x3002, 0, &[0, 0, 0, 0]).await
    );

    // The client is still usable after an abort
    client.download(0x3002, 0, &[5, 6]).await.unwrap();
    assert_eq!(vec![5, 6], client.upload(0x3002, 0).await.unwrap());
}

#[tokio::test]
async fn test_toggle_mismatch() {
    let (mut client, bus) = setup(
        SimDevice::new(NODE_ID)
            .with_object(0x3000, 0, AccessType::Rw, &[0; 10])
            .with_broken_toggle(),
    );
    let _logger = BusLogger::new(bus.new_receiver());

    assert_eq!(
        Err(SdoClientError::ToggleNotAlternated),
        client.upload(0x3000, 0).await
    );
    assert_eq!(
        Err(SdoClientError::ToggleNotAlternated),
        client.download(0x3000, 0, &[1; 10]).await
    );
}

#[tokio::test]
async fn test_no_response() {
    let (mut client, _bus) = setup(SimDevice::new(NODE_ID).silent());
    assert_eq!(Err(SdoClientError::NoResponse), client.upload(0x1000, 0).await);
}
