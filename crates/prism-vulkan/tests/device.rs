//! On-device behavior tests.
//!
//! These exercise a real driver and are ignored by default; run them on a
//! machine with a Vulkan ICD via `cargo test -p prism-vulkan -- --ignored`.

use prism_core::desc::{
    AdapterOptions, BufferDescriptor, DeviceDescriptor, FenceDescriptor, SemaphoreDescriptor,
    TextureDescriptor,
};
use prism_core::error::GfxError;
use prism_core::flags::{BufferUsages, MemoryProperties, TextureUsages};
use prism_core::types::{Extent3d, Origin3d, SemaphoreKind, TextureLayout};
use prism_core::TextureFormat;
use prism_vulkan::{
    CommandEncoder, Device, EncoderState, Fence, Instance, InstanceBuilder, RetiredFrame,
    RetiredQueue, Semaphore, Submit, Texture,
};

fn test_device() -> (Instance, Device) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let instance = InstanceBuilder::new()
        .app_name("prism-tests")
        .validation(true)
        .build()
        .expect("Vulkan instance");
    let adapter = instance
        .request_adapter(&AdapterOptions::default())
        .expect("adapter");
    let device = adapter
        .create_device(&instance, &DeviceDescriptor::default())
        .expect("device");
    (instance, device)
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn staged_write_round_trips_through_device_local_memory() {
    let (_instance, device) = test_device();
    let queue = device.default_queue();

    let mut storage = prism_vulkan::Buffer::new(
        &device,
        &BufferDescriptor {
            label: Some("storage"),
            size: 1024,
            usage: BufferUsages::COPY_SRC | BufferUsages::COPY_DST | BufferUsages::STORAGE,
            memory: MemoryProperties::DEVICE_LOCAL,
        },
    )
    .unwrap();
    assert!(!storage.is_host_visible());

    let payload: Vec<u8> = (0..=255).collect();
    queue.write_buffer(&device, &storage, 256, &payload).unwrap();

    // Read back through a second staged copy
    let mut readback = prism_vulkan::Buffer::new(
        &device,
        &BufferDescriptor {
            label: Some("readback"),
            size: 1024,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            memory: MemoryProperties::HOST_VISIBLE,
        },
    )
    .unwrap();

    let mut encoder = CommandEncoder::new(&device, Some("readback copy")).unwrap();
    encoder
        .copy_buffer_to_buffer(&storage, 0, &readback, 0, 1024)
        .unwrap();
    encoder.end().unwrap();

    let fence = Fence::new(&device, &FenceDescriptor::default()).unwrap();
    queue
        .submit(
            &device,
            &Submit {
                command_encoders: &[&encoder],
                fence: Some(&fence),
                ..Submit::default()
            },
        )
        .unwrap();
    fence.wait(&device, u64::MAX).unwrap();

    let ptr = readback.map(0, 0).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 1024) };
    assert_eq!(&bytes[256..512], payload.as_slice());
    readback.unmap().unwrap();

    device.wait_idle().unwrap();
    unsafe {
        fence.destroy(&device);
        storage.destroy(&device).unwrap();
        readback.destroy(&device).unwrap();
    }
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn fence_round_trip() {
    let (_instance, device) = test_device();

    let fence = Fence::new(
        &device,
        &FenceDescriptor {
            label: None,
            signaled: true,
        },
    )
    .unwrap();

    // Created signaled: a zero-timeout wait must succeed without blocking
    fence.wait(&device, 0).unwrap();
    assert!(fence.status(&device).unwrap());

    fence.reset(&device).unwrap();
    assert!(!fence.status(&device).unwrap());
    assert!(matches!(fence.wait(&device, 0), Err(GfxError::Timeout)));

    unsafe { fence.destroy(&device) };
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn timeline_semaphore_counter_is_monotonic() {
    let (_instance, device) = test_device();

    let semaphore = Semaphore::new(
        &device,
        &SemaphoreDescriptor {
            label: None,
            kind: SemaphoreKind::Timeline,
            initial_value: 0,
        },
    )
    .unwrap();

    semaphore.signal(&device, 5).unwrap();
    // A lower signal never moves the counter backward
    semaphore.signal(&device, 3).unwrap();
    assert_eq!(semaphore.value(&device).unwrap(), 5);

    semaphore.wait(&device, 5, 0).unwrap();
    assert!(matches!(
        semaphore.wait(&device, 10, 1_000_000),
        Err(GfxError::Timeout)
    ));

    unsafe { semaphore.destroy(&device) };
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn binary_semaphore_rejects_host_operations() {
    let (_instance, device) = test_device();

    let semaphore = Semaphore::new(&device, &SemaphoreDescriptor::default()).unwrap();
    assert_eq!(semaphore.kind(), SemaphoreKind::Binary);

    assert!(matches!(
        semaphore.signal(&device, 1),
        Err(GfxError::InvalidArgument(_))
    ));
    assert!(matches!(
        semaphore.wait(&device, 1, 0),
        Err(GfxError::InvalidArgument(_))
    ));
    assert!(matches!(
        semaphore.value(&device),
        Err(GfxError::InvalidArgument(_))
    ));

    unsafe { semaphore.destroy(&device) };
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn texture_reports_each_transition_exactly_once() {
    let (_instance, device) = test_device();
    let queue = device.default_queue();

    let mut texture = Texture::new(
        &device,
        &TextureDescriptor {
            label: Some("target"),
            size: Extent3d::new(64, 64, 1),
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::COPY_SRC
                | TextureUsages::COPY_DST,
            ..TextureDescriptor::default()
        },
    )
    .unwrap();
    assert_eq!(texture.layout(), TextureLayout::Undefined);

    let mut encoder = CommandEncoder::new(&device, None).unwrap();

    texture
        .transition_layout(&mut encoder, TextureLayout::ColorAttachment, 0, 1, 0, 1)
        .unwrap();
    assert_eq!(texture.layout(), TextureLayout::ColorAttachment);

    texture
        .transition_layout(&mut encoder, TextureLayout::TransferSrc, 0, 1, 0, 1)
        .unwrap();
    assert_eq!(texture.layout(), TextureLayout::TransferSrc);

    encoder.end().unwrap();
    let fence = Fence::new(&device, &FenceDescriptor::default()).unwrap();
    queue
        .submit(
            &device,
            &Submit {
                command_encoders: &[&encoder],
                fence: Some(&fence),
                ..Submit::default()
            },
        )
        .unwrap();
    fence.wait(&device, u64::MAX).unwrap();

    device.wait_idle().unwrap();
    unsafe {
        fence.destroy(&device);
        texture.destroy(&device).unwrap();
    }
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn mipmap_generation_leaves_requested_layout() {
    let (_instance, device) = test_device();
    let queue = device.default_queue();

    let mut texture = Texture::new(
        &device,
        &TextureDescriptor {
            label: Some("mipmapped"),
            size: Extent3d::new(256, 256, 1),
            mip_level_count: 4,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::COPY_SRC
                | TextureUsages::COPY_DST
                | TextureUsages::TEXTURE_BINDING,
            ..TextureDescriptor::default()
        },
    )
    .unwrap();

    // Seed level 0 so the blit chain has defined contents
    let texels = vec![0xA5u8; 256 * 256 * 4];
    queue
        .write_texture(
            &device,
            &texture,
            Origin3d::ZERO,
            0,
            &texels,
            Extent3d::new(256, 256, 1),
            TextureLayout::TransferDst,
        )
        .unwrap();

    let mut encoder = CommandEncoder::new(&device, None).unwrap();
    texture
        .generate_mipmaps(&mut encoder, TextureLayout::TransferDst)
        .unwrap();
    encoder.end().unwrap();

    let fence = Fence::new(&device, &FenceDescriptor::default()).unwrap();
    queue
        .submit(
            &device,
            &Submit {
                command_encoders: &[&encoder],
                fence: Some(&fence),
                ..Submit::default()
            },
        )
        .unwrap();
    fence.wait(&device, u64::MAX).unwrap();

    // Every level, the last included, ends in the requested layout
    assert_eq!(texture.layout(), TextureLayout::TransferDst);

    device.wait_idle().unwrap();
    unsafe {
        fence.destroy(&device);
        texture.destroy(&device).unwrap();
    }
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn encoder_walks_the_recording_state_machine() {
    let (_instance, device) = test_device();

    let mut encoder = CommandEncoder::new(&device, None).unwrap();
    assert_eq!(encoder.state(), EncoderState::Recording);

    encoder.end().unwrap();
    assert_eq!(encoder.state(), EncoderState::Ended);

    // Recording into an ended encoder fails fast
    let buffer = prism_vulkan::Buffer::new(
        &device,
        &BufferDescriptor {
            label: None,
            size: 64,
            usage: BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            memory: MemoryProperties::HOST_VISIBLE,
        },
    )
    .unwrap();
    assert!(matches!(
        encoder.copy_buffer_to_buffer(&buffer, 0, &buffer, 32, 16),
        Err(GfxError::InvalidArgument(_))
    ));
    // Ending twice is also a state error
    assert!(matches!(encoder.end(), Err(GfxError::InvalidArgument(_))));

    encoder.begin().unwrap();
    assert_eq!(encoder.state(), EncoderState::Recording);

    let mut buffer = buffer;
    device.wait_idle().unwrap();
    unsafe { buffer.destroy(&device).unwrap() };
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn submitting_an_unended_encoder_fails() {
    let (_instance, device) = test_device();
    let queue = device.default_queue();

    let encoder = CommandEncoder::new(&device, None).unwrap();
    let result = queue.submit(
        &device,
        &Submit {
            command_encoders: &[&encoder],
            ..Submit::default()
        },
    );
    assert!(matches!(result, Err(GfxError::InvalidArgument(_))));
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn retired_queue_reclaims_once_fence_signals() {
    let (_instance, device) = test_device();
    let queue = device.default_queue();

    let mut encoder = CommandEncoder::new(&device, None).unwrap();
    encoder.end().unwrap();

    let fence = Fence::new(&device, &FenceDescriptor::default()).unwrap();
    queue
        .submit(
            &device,
            &Submit {
                command_encoders: &[&encoder],
                fence: Some(&fence),
                ..Submit::default()
            },
        )
        .unwrap();

    let mut retired = RetiredQueue::new();
    retired.retire(
        fence,
        RetiredFrame {
            encoders: vec![encoder],
            buffers: vec![],
        },
    );
    assert_eq!(retired.pending_count(), 1);

    // Drain until the fence is observed signaled
    loop {
        if retired.drain(&device).unwrap() == 1 {
            break;
        }
        std::thread::yield_now();
    }
    assert_eq!(retired.pending_count(), 0);
}

#[test]
#[ignore = "requires a Vulkan ICD"]
fn write_texture_applies_final_layout() {
    let (_instance, device) = test_device();
    let queue = device.default_queue();

    let mut texture = Texture::new(
        &device,
        &TextureDescriptor {
            label: None,
            size: Extent3d::new(16, 16, 1),
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            ..TextureDescriptor::default()
        },
    )
    .unwrap();

    let texels = vec![0xFFu8; 16 * 16 * 4];
    queue
        .write_texture(
            &device,
            &texture,
            Origin3d::ZERO,
            0,
            &texels,
            Extent3d::new(16, 16, 1),
            TextureLayout::ShaderReadOnly,
        )
        .unwrap();

    assert_eq!(texture.layout(), TextureLayout::ShaderReadOnly);

    device.wait_idle().unwrap();
    unsafe { texture.destroy(&device).unwrap() };
}
